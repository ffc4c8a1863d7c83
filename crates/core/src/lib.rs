//! SAMS Core - Shared domain types and business rules.
//!
//! This crate provides the types used across all SAMS components:
//! - `api` - JSON API for building staff and residents
//! - `cli` - Command-line tools for migrations and maintenance tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Anything that decides *whether* something is allowed
//! (status transitions, interval overlap, ticket SLA, invoice arithmetic)
//! lives here so it can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, statuses, periods, money, ticket and card rules
//! - [`pagination`] - Page request/response types shared by list endpoints
//! - [`log`] - Username extraction from free-text action log details

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod log;
pub mod pagination;
pub mod types;

pub use pagination::{Page, PageRequest, SortOrder};
pub use types::*;
