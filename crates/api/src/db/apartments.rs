//! Apartment repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{ApartmentId, ApartmentStatus, FloorId, Page};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::building::{Apartment, ApartmentFilter, ApartmentInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ApartmentRow {
    id: ApartmentId,
    floor_id: FloorId,
    floor_number: i32,
    number: String,
    area_m2: Option<Decimal>,
    bedrooms: Option<i32>,
    apartment_type: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApartmentRow> for Apartment {
    type Error = RepositoryError;

    fn try_from(row: ApartmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            floor_id: row.floor_id,
            floor_number: row.floor_number,
            number: row.number,
            area_m2: row.area_m2,
            bedrooms: row.bedrooms,
            apartment_type: row.apartment_type,
            status: parse_column::<ApartmentStatus>(&row.status, "status")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const APARTMENT_SELECT: &str = "
    SELECT a.id, a.floor_id, f.floor_number, a.number, a.area_m2, a.bedrooms,
           a.apartment_type, a.status, a.created_at, a.updated_at
    FROM building.apartments a
    JOIN building.floors f ON f.id = a.floor_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ApartmentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(number) = filter.number.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND a.number ILIKE ").push_bind(format!("%{number}%"));
    }
    if let Some(floor_id) = filter.floor_id {
        qb.push(" AND a.floor_id = ").push_bind(floor_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND a.status = ").push_bind(status.as_str());
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for apartments.
pub struct ApartmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApartmentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List apartments ordered by floor then number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ApartmentFilter) -> Result<Page<Apartment>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM building.apartments a",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(APARTMENT_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY f.floor_number, a.number LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<ApartmentRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ApartmentId) -> Result<Option<Apartment>, RepositoryError> {
        let row = sqlx::query_as::<_, ApartmentRow>(&format!("{APARTMENT_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Active apartments, used by monthly invoice generation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Apartment>, RepositoryError> {
        let rows = sqlx::query_as::<_, ApartmentRow>(&format!(
            "{APARTMENT_SELECT} WHERE a.status = $1 ORDER BY f.floor_number, a.number"
        ))
        .bind(ApartmentStatus::Active.as_str())
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the apartment number is taken.
    pub async fn create(&self, input: &ApartmentInput) -> Result<Apartment, RepositoryError> {
        let id = ApartmentId::new_v4();
        sqlx::query(
            "INSERT INTO building.apartments
                (id, floor_id, number, area_m2, bedrooms, apartment_type, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(input.floor_id)
        .bind(input.number.trim())
        .bind(input.area_m2)
        .bind(input.bedrooms)
        .bind(input.apartment_type.as_deref())
        .bind(input.status.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "apartment number already exists"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the apartment does not exist.
    pub async fn update(
        &self,
        id: ApartmentId,
        input: &ApartmentInput,
    ) -> Result<Apartment, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.apartments
             SET floor_id = $2, number = $3, area_m2 = $4, bedrooms = $5,
                 apartment_type = $6, status = $7, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.floor_id)
        .bind(input.number.trim())
        .bind(input.area_m2)
        .bind(input.bedrooms)
        .bind(input.apartment_type.as_deref())
        .bind(input.status.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "apartment number already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the apartment does not exist, or
    /// `RepositoryError::Conflict` if invoices or bookings still reference it.
    pub async fn delete(&self, id: ApartmentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.apartments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    RepositoryError::Conflict("apartment is still referenced".to_owned())
                }
                other => other.into(),
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
