//! Asset repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{ApartmentId, AssetId, AssetStatus, Page};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::asset::{Asset, AssetFilter, AssetInput};

#[derive(Debug, sqlx::FromRow)]
struct AssetRow {
    id: AssetId,
    code: String,
    name: String,
    apartment_id: Option<ApartmentId>,
    location: Option<String>,
    purchase_date: Option<NaiveDate>,
    warranty_expire: Option<NaiveDate>,
    maintenance_frequency_days: Option<i32>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = RepositoryError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            code: row.code,
            name: row.name,
            apartment_id: row.apartment_id,
            location: row.location,
            purchase_date: row.purchase_date,
            warranty_expire: row.warranty_expire,
            maintenance_frequency_days: row.maintenance_frequency_days,
            status: parse_column::<AssetStatus>(&row.status, "status")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ASSET_COLUMNS: &str = "id, code, name, apartment_id, location, purchase_date, \
    warranty_expire, maintenance_frequency_days, status, created_at, updated_at";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AssetFilter) {
    qb.push(" WHERE NOT is_deleted");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

/// Repository for building assets.
pub struct AssetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AssetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &AssetFilter) -> Result<Page<Asset>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.assets");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {ASSET_COLUMNS} FROM building.assets"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY code LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<AssetRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AssetId) -> Result<Option<Asset>, RepositoryError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM building.assets WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the asset code is taken.
    pub async fn create(&self, input: &AssetInput) -> Result<Asset, RepositoryError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "INSERT INTO building.assets
                (id, code, name, apartment_id, location, purchase_date, warranty_expire,
                 maintenance_frequency_days, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ASSET_COLUMNS}"
        ))
        .bind(AssetId::new_v4())
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.apartment_id)
        .bind(input.location.as_deref())
        .bind(input.purchase_date)
        .bind(input.warranty_expire)
        .bind(input.maintenance_frequency_days)
        .bind(input.status.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "asset code already exists"))?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the asset does not exist.
    pub async fn update(&self, id: AssetId, input: &AssetInput) -> Result<Asset, RepositoryError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "UPDATE building.assets
             SET code = $2, name = $3, apartment_id = $4, location = $5, purchase_date = $6,
                 warranty_expire = $7, maintenance_frequency_days = $8, status = $9,
                 updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {ASSET_COLUMNS}"
        ))
        .bind(id)
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.apartment_id)
        .bind(input.location.as_deref())
        .bind(input.purchase_date)
        .bind(input.warranty_expire)
        .bind(input.maintenance_frequency_days)
        .bind(input.status.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "asset code already exists"))?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the asset does not exist.
    pub async fn set_status(&self, id: AssetId, status: AssetStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.assets SET status = $2, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the asset does not exist.
    pub async fn soft_delete(&self, id: AssetId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.assets SET is_deleted = TRUE, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
