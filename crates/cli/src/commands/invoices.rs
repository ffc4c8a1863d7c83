//! Invoice commands.
//!
//! # Usage
//!
//! ```bash
//! # Generate March 2025 invoices for every occupied apartment
//! sams-cli invoices generate --year 2025 --month 3
//! ```
//!
//! Apartments already invoiced for the month are skipped, so the command is
//! safe to re-run after a partial failure.

use sams_api::clock::BuildingClock;
use sams_api::models::invoice::MonthlyGenerationReport;
use sams_api::services::InvoiceService;

use super::{CommandError, connect};

/// Run the monthly invoice generation for one period.
pub async fn generate(year: i32, month: u32) -> Result<MonthlyGenerationReport, CommandError> {
    if !(1..=12).contains(&month) {
        return Err(CommandError::InvalidArgument(format!(
            "Invalid month: {month}. Expected 1-12"
        )));
    }

    let pool = connect().await?;
    let report = InvoiceService::new(&pool, None, BuildingClock::default())
        .generate_monthly(year, month, "cli")
        .await?;

    tracing::info!("Period {}: {} invoice(s) created", report.period, report.created.len());
    for invoice_no in &report.created {
        tracing::info!("  {}", invoice_no);
    }
    if report.skipped_existing > 0 {
        tracing::info!("  {} apartment(s) already invoiced", report.skipped_existing);
    }
    if report.skipped_empty > 0 {
        tracing::info!("  {} apartment(s) with nothing to bill", report.skipped_empty);
    }
    if !report.failed.is_empty() {
        tracing::warn!("  Failed apartments: {}", report.failed.join(", "));
    }
    Ok(report)
}
