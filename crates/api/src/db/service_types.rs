//! Service type catalogue (read-only from the API).

use rust_decimal::Decimal;
use sqlx::PgPool;

use sams_core::ServiceTypeId;

use super::RepositoryError;
use crate::models::invoice::ServiceType;

#[derive(Debug, sqlx::FromRow)]
struct ServiceTypeRow {
    id: ServiceTypeId,
    code: String,
    name: String,
    unit: Option<String>,
    unit_price: Decimal,
    is_recurring: bool,
    is_area_based: bool,
    is_active: bool,
}

impl From<ServiceTypeRow> for ServiceType {
    fn from(row: ServiceTypeRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            unit: row.unit,
            unit_price: row.unit_price,
            is_recurring: row.is_recurring,
            is_area_based: row.is_area_based,
            is_active: row.is_active,
        }
    }
}

const COLUMNS: &str = "id, code, name, unit, unit_price, is_recurring, is_area_based, is_active";

pub struct ServiceTypeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ServiceTypeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ServiceType>, RepositoryError> {
        let rows = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_types ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active services billed every month.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recurring(&self) -> Result<Vec<ServiceType>, RepositoryError> {
        let rows = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_types
             WHERE is_recurring AND is_active ORDER BY code"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ServiceTypeId) -> Result<Option<ServiceType>, RepositoryError> {
        let row = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
