//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sams-cli migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and create everything under
//! the `building` schema, including the session table.

use super::{CommandError, connect};

/// Apply all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running SAMS migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
