//! Database operations for the SAMS `PostgreSQL` schema.
//!
//! # Schema: `building`
//!
//! ## Tables
//!
//! - `users` - Staff and resident logins (argon2 password hashes)
//! - `floors`, `apartments`, `residents`, `resident_apartments` - Building structure
//! - `tickets`, `ticket_comments` - Service requests
//! - `service_types`, `service_prices`, `invoices`, `invoice_details`, `invoice_configuration` - Billing
//! - `receipts` - Payment receipts (phiếu thu)
//! - `vouchers`, `voucher_items` - Payment vouchers (phiếu chi)
//! - `assets`, `asset_maintenance_schedules` - Equipment upkeep
//! - `amenities`, `amenity_packages`, `amenity_bookings` - Shared facilities
//! - `access_cards`, `card_history` - Door access cards
//! - `vehicles` - Registered vehicles for parking
//! - `documents`, `document_versions`, `document_action_logs` - Building documents
//! - `announcements` - Notices shown to residents
//! - `session` - tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! sams-cli migrate
//! ```

pub mod access_cards;
pub mod amenities;
pub mod announcements;
pub mod apartments;
pub mod assets;
pub mod bookings;
pub mod documents;
pub mod floors;
pub mod invoice_config;
pub mod invoices;
pub mod maintenance;
pub mod receipts;
pub mod residents;
pub mod service_prices;
pub mod service_types;
pub mod tickets;
pub mod users;
pub mod vehicles;
pub mod vouchers;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use access_cards::AccessCardRepository;
pub use amenities::AmenityRepository;
pub use announcements::AnnouncementRepository;
pub use apartments::ApartmentRepository;
pub use assets::AssetRepository;
pub use bookings::BookingRepository;
pub use documents::DocumentRepository;
pub use floors::FloorRepository;
pub use invoice_config::InvoiceConfigRepository;
pub use invoices::InvoiceRepository;
pub use maintenance::MaintenanceRepository;
pub use receipts::ReceiptRepository;
pub use residents::ResidentRepository;
pub use service_prices::ServicePriceRepository;
pub use service_types::ServiceTypeRepository;
pub use tickets::TicketRepository;
pub use users::UserRepository;
pub use vehicles::VehicleRepository;
pub use vouchers::VoucherRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate apartment number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-index violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(e)
}

/// Parse a stored wire value, reporting garbage as data corruption.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use sams_core::{InvoiceStatus, TicketStatus};

    use super::*;

    #[test]
    fn test_parse_column() {
        let status: InvoiceStatus = parse_column("ISSUED", "status").expect("valid");
        assert_eq!(status, InvoiceStatus::Issued);
        let ticket: TicketStatus = parse_column("đang xử lý", "status").expect("valid");
        assert_eq!(ticket, TicketStatus::InProgress);

        let err = parse_column::<InvoiceStatus>("SHIPPED", "status").unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(ref msg) if msg.contains("status")));
    }

    #[test]
    fn test_conflict_on_unique_passes_other_errors() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}
