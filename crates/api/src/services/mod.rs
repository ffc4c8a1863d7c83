//! Business rules layered over the repositories.
//!
//! # Services
//!
//! - `access_cards` - Card issuing with change history
//! - `announcements` - Visibility windows and derived status
//! - `auth` - Password login
//! - `bookings` - Amenity bookings and their lifecycle
//! - `documents` - Document versions and the approval workflow
//! - `email` - Resident notifications via SMTP
//! - `invoices` - Invoices, numbering and monthly generation
//! - `maintenance` - Maintenance schedules, reminders and asset status
//! - `receipts` - Payment receipts that settle invoices
//! - `service_prices` - Effective-dated service price list
//! - `tickets` - Service tickets and their comment trail
//! - `vehicles` - Vehicle registration for parking
//! - `vouchers` - Payment vouchers

pub mod access_cards;
pub mod announcements;
pub mod auth;
pub mod bookings;
pub mod documents;
pub mod email;
pub mod invoices;
pub mod maintenance;
pub mod receipts;
pub mod service_prices;
pub mod tickets;
pub mod vehicles;
pub mod vouchers;

use axum::http::StatusCode;
use thiserror::Error;

use sams_core::{CardNumberError, EmailError as AddressError, MoneyError, PeriodError, StatusError, TicketError};

use crate::db::RepositoryError;

pub use access_cards::AccessCardService;
pub use announcements::AnnouncementService;
pub use auth::{AuthError, AuthService};
pub use bookings::BookingService;
pub use documents::DocumentService;
pub use email::{EmailError, EmailService};
pub use invoices::InvoiceService;
pub use maintenance::MaintenanceService;
pub use receipts::ReceiptService;
pub use service_prices::ServicePriceService;
pub use tickets::TicketService;
pub use vehicles::VehicleService;
pub use vouchers::VoucherService;

/// Errors raised by business rules.
///
/// Messages are shown to the user verbatim.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request duplicates existing data.
    #[error("{0}")]
    Conflict(String),

    /// The entity's current state does not allow the operation.
    #[error("{0}")]
    InvalidState(String),

    /// The caller may not touch this entity.
    #[error("{0}")]
    Forbidden(String),
}

impl ServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Repository(RepositoryError::NotFound) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Repository(RepositoryError::Conflict(_))
            | Self::Conflict(_)
            | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<StatusError> for ServiceError {
    fn from(e: StatusError) -> Self {
        Self::InvalidState(e.to_string())
    }
}

macro_rules! validation_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for ServiceError {
                fn from(e: $source) -> Self {
                    Self::Validation(e.to_string())
                }
            }
        )+
    };
}

validation_from!(TicketError, PeriodError, MoneyError, CardNumberError, AddressError);

/// Trim an optional string, mapping blank to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::invalid_state("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::Repository(RepositoryError::DataCorruption("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Repository(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_status_error_is_invalid_state() {
        let err: ServiceError = StatusError::Unchanged("PAID").into();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(err.to_string(), "already PAID");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  a ")), Some("a".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
