//! Singleton invoice configuration row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::invoice::{InvoiceConfigInput, InvoiceConfiguration};

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    generation_day_of_month: i32,
    due_days_after_issue: i32,
    is_enabled: bool,
    notes: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<ConfigRow> for InvoiceConfiguration {
    type Error = RepositoryError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let day = u32::try_from(row.generation_day_of_month).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "invalid generation day: {}",
                row.generation_day_of_month
            ))
        })?;
        let due = u32::try_from(row.due_days_after_issue).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "invalid due days: {}",
                row.due_days_after_issue
            ))
        })?;
        Ok(Self {
            generation_day_of_month: day,
            due_days_after_issue: due,
            is_enabled: row.is_enabled,
            notes: row.notes,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

pub struct InvoiceConfigRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InvoiceConfigRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The most recent configuration, or the defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current(&self) -> Result<InvoiceConfiguration, RepositoryError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT generation_day_of_month, due_days_after_issue, is_enabled, notes,
                    updated_at, updated_by
             FROM building.invoice_configuration
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        row.map_or_else(|| Ok(InvoiceConfiguration::default()), TryInto::try_into)
    }

    /// Replace the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn upsert(
        &self,
        input: &InvoiceConfigInput,
        actor: &str,
    ) -> Result<InvoiceConfiguration, RepositoryError> {
        let day = i32::try_from(input.generation_day_of_month)
            .map_err(|_| RepositoryError::Conflict("generation day out of range".to_owned()))?;
        let due = i32::try_from(input.due_days_after_issue)
            .map_err(|_| RepositoryError::Conflict("due days out of range".to_owned()))?;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE building.invoice_configuration
             SET generation_day_of_month = $1, due_days_after_issue = $2, is_enabled = $3,
                 notes = $4, updated_at = NOW(), updated_by = $5",
        )
        .bind(day)
        .bind(due)
        .bind(input.is_enabled)
        .bind(input.notes.as_deref())
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO building.invoice_configuration
                    (id, generation_day_of_month, due_days_after_issue, is_enabled, notes,
                     updated_at, updated_by)
                 VALUES ($1, $2, $3, $4, $5, NOW(), $6)",
            )
            .bind(uuid::Uuid::new_v4())
            .bind(day)
            .bind(due)
            .bind(input.is_enabled)
            .bind(input.notes.as_deref())
            .bind(actor)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            generation_day = input.generation_day_of_month,
            due_days = input.due_days_after_issue,
            enabled = input.is_enabled,
            "Invoice configuration updated"
        );
        self.current().await
    }
}
