//! Core types for SAMS.
//!
//! This module provides type-safe wrappers and pure rules for the building
//! management domain.

pub mod card;
pub mod contact;
pub mod id;
pub mod money;
pub mod period;
pub mod status;
pub mod ticket;

pub use card::{CardNumber, CardNumberError};
pub use contact::{Email, EmailError, PhoneError, PhoneNumber};
pub use id::*;
pub use money::{
    InvoiceTotals, LineAmounts, MoneyError, checked_product, line_amounts, round_vnd, voucher_total,
};
pub use period::{DateRange, MonthPeriod, PeriodError, TimedRange, add_months, package_end_date};
pub use status::*;
pub use ticket::{TicketCategory, TicketError, TicketPriority, TicketScope};
