//! Amenity and amenity package repository. Both soft delete.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sams_core::{AmenityId, AmenityStatus, AssetId, PackageId, PeriodUnit};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::amenity::{Amenity, AmenityInput, AmenityPackage, PackageInput};

const DEFAULT_FEE_TYPE: &str = "Paid";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AmenityRow {
    id: AmenityId,
    asset_id: Option<AssetId>,
    code: String,
    name: String,
    category_name: Option<String>,
    location: Option<String>,
    has_monthly_package: bool,
    fee_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AmenityRow> for Amenity {
    type Error = RepositoryError;

    fn try_from(row: AmenityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            asset_id: row.asset_id,
            code: row.code,
            name: row.name,
            category_name: row.category_name,
            location: row.location,
            has_monthly_package: row.has_monthly_package,
            fee_type: row.fee_type,
            status: parse_column::<AmenityStatus>(&row.status, "status")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    id: PackageId,
    amenity_id: AmenityId,
    name: String,
    month_count: i32,
    duration_days: Option<i32>,
    period_unit: String,
    price: i32,
    description: Option<String>,
    status: String,
}

impl TryFrom<PackageRow> for AmenityPackage {
    type Error = RepositoryError;

    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        let month_count = u32::try_from(row.month_count).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative month_count: {}", row.month_count))
        })?;
        let duration_days = row
            .duration_days
            .map(u32::try_from)
            .transpose()
            .map_err(|_| RepositoryError::DataCorruption("negative duration_days".to_owned()))?;

        Ok(Self {
            id: row.id,
            amenity_id: row.amenity_id,
            name: row.name,
            month_count,
            duration_days,
            period_unit: parse_column::<PeriodUnit>(&row.period_unit, "period_unit")?,
            price: row.price,
            description: row.description,
            status: parse_column::<AmenityStatus>(&row.status, "status")?,
        })
    }
}

const AMENITY_COLUMNS: &str = "id, asset_id, code, name, category_name, location, \
    has_monthly_package, fee_type, status, created_at, updated_at";

const PACKAGE_COLUMNS: &str =
    "id, amenity_id, name, month_count, duration_days, period_unit, price, description, status";

fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for amenities and their packages.
pub struct AmenityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AmenityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Amenity>, RepositoryError> {
        let rows = sqlx::query_as::<_, AmenityRow>(&format!(
            "SELECT {AMENITY_COLUMNS} FROM building.amenities WHERE NOT is_deleted ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AmenityId) -> Result<Option<Amenity>, RepositoryError> {
        let row = sqlx::query_as::<_, AmenityRow>(&format!(
            "SELECT {AMENITY_COLUMNS} FROM building.amenities WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the amenity code is taken.
    pub async fn create(&self, input: &AmenityInput) -> Result<Amenity, RepositoryError> {
        let row = sqlx::query_as::<_, AmenityRow>(&format!(
            "INSERT INTO building.amenities
                (id, asset_id, code, name, category_name, location, has_monthly_package,
                 fee_type, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {AMENITY_COLUMNS}"
        ))
        .bind(AmenityId::new_v4())
        .bind(input.asset_id)
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.category_name.as_deref())
        .bind(input.location.as_deref())
        .bind(input.has_monthly_package)
        .bind(input.fee_type.as_deref().unwrap_or(DEFAULT_FEE_TYPE))
        .bind(input.status.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "amenity code already exists"))?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the amenity does not exist.
    pub async fn update(&self, id: AmenityId, input: &AmenityInput) -> Result<Amenity, RepositoryError> {
        let row = sqlx::query_as::<_, AmenityRow>(&format!(
            "UPDATE building.amenities
             SET asset_id = $2, code = $3, name = $4, category_name = $5, location = $6,
                 has_monthly_package = $7, fee_type = COALESCE($8, fee_type), status = $9,
                 updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {AMENITY_COLUMNS}"
        ))
        .bind(id)
        .bind(input.asset_id)
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.category_name.as_deref())
        .bind(input.location.as_deref())
        .bind(input.has_monthly_package)
        .bind(input.fee_type.as_deref())
        .bind(input.status.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "amenity code already exists"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the amenity does not exist.
    pub async fn soft_delete(&self, id: AmenityId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenities SET is_deleted = TRUE, updated_at = NOW()
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

    /// Propagate an asset status change to the amenities built on it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status_for_asset(
        &self,
        asset_id: AssetId,
        status: AmenityStatus,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenities SET status = $2, updated_at = NOW()
             WHERE asset_id = $1 AND NOT is_deleted AND status <> $2",
        )
        .bind(asset_id)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ===== Packages =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn packages(&self, amenity_id: AmenityId) -> Result<Vec<AmenityPackage>, RepositoryError> {
        let rows = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM building.amenity_packages
             WHERE amenity_id = $1 AND NOT is_deleted
             ORDER BY price, name"
        ))
        .bind(amenity_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_package(&self, id: PackageId) -> Result<Option<AmenityPackage>, RepositoryError> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM building.amenity_packages WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_package(
        &self,
        amenity_id: AmenityId,
        input: &PackageInput,
    ) -> Result<AmenityPackage, RepositoryError> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "INSERT INTO building.amenity_packages
                (id, amenity_id, name, month_count, duration_days, period_unit, price,
                 description, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PACKAGE_COLUMNS}"
        ))
        .bind(PackageId::new_v4())
        .bind(amenity_id)
        .bind(input.name.trim())
        .bind(to_db_count(input.month_count))
        .bind(input.duration_days.map(to_db_count))
        .bind(input.period_unit.as_str())
        .bind(input.price)
        .bind(input.description.as_deref())
        .bind(input.status.as_str())
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the package does not exist.
    pub async fn update_package(
        &self,
        id: PackageId,
        input: &PackageInput,
    ) -> Result<AmenityPackage, RepositoryError> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "UPDATE building.amenity_packages
             SET name = $2, month_count = $3, duration_days = $4, period_unit = $5,
                 price = $6, description = $7, status = $8
             WHERE id = $1 AND NOT is_deleted
             RETURNING {PACKAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(to_db_count(input.month_count))
        .bind(input.duration_days.map(to_db_count))
        .bind(input.period_unit.as_str())
        .bind(input.price)
        .bind(input.description.as_deref())
        .bind(input.status.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the package does not exist.
    pub async fn soft_delete_package(&self, id: PackageId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenity_packages SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted",
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
