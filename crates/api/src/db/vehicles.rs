//! Vehicle repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{ApartmentId, Page, ResidentId, VehicleId, VehicleStatus, VehicleType};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::vehicle::{Vehicle, VehicleCounts, VehicleFilter, VehicleInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: VehicleId,
    apartment_id: ApartmentId,
    apartment_number: Option<String>,
    resident_id: Option<ResidentId>,
    vehicle_type: String,
    license_plate: String,
    color: Option<String>,
    brand_model: Option<String>,
    status: String,
    registered_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = RepositoryError;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            apartment_id: row.apartment_id,
            apartment_number: row.apartment_number,
            resident_id: row.resident_id,
            vehicle_type: parse_column::<VehicleType>(&row.vehicle_type, "vehicle_type")?,
            license_plate: row.license_plate,
            color: row.color,
            brand_model: row.brand_model,
            status: parse_column::<VehicleStatus>(&row.status, "status")?,
            registered_at: row.registered_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

const VEHICLE_SELECT: &str = "
    SELECT v.id, v.apartment_id, a.number AS apartment_number, v.resident_id, v.vehicle_type,
           v.license_plate, v.color, v.brand_model, v.status, v.registered_at, v.created_by,
           v.updated_at, v.updated_by
    FROM building.vehicles v
    LEFT JOIN building.apartments a ON a.id = v.apartment_id";

const PLATE_TAKEN: &str = "license plate already registered";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &VehicleFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND v.license_plate ILIKE ").push_bind(format!("%{q}%"));
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(" AND v.apartment_id = ").push_bind(apartment_id);
    }
    if let Some(kind) = filter.vehicle_type {
        qb.push(" AND v.vehicle_type = ").push_bind(kind.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND v.status = ").push_bind(status.as_str());
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for registered vehicles.
pub struct VehicleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VehicleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &VehicleFilter) -> Result<Page<Vehicle>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.vehicles v");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(VEHICLE_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY v.registered_at DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<VehicleRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let row = sqlx::query_as::<_, VehicleRow>(&format!("{VEHICLE_SELECT} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Insert a vehicle. `plate` is the normalized license plate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the plate is registered.
    pub async fn create(
        &self,
        plate: &str,
        input: &VehicleInput,
        actor: &str,
    ) -> Result<Vehicle, RepositoryError> {
        let id = VehicleId::new_v4();
        sqlx::query(
            "INSERT INTO building.vehicles
                (id, apartment_id, resident_id, vehicle_type, license_plate, color, brand_model,
                 status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(input.apartment_id)
        .bind(input.resident_id)
        .bind(input.vehicle_type.as_str())
        .bind(plate)
        .bind(input.color.as_deref())
        .bind(input.brand_model.as_deref())
        .bind(input.status.as_str())
        .bind(actor)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, PLATE_TAKEN))?;

        tracing::info!(vehicle_id = %id, license_plate = %plate, "Vehicle registered");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vehicle does not exist and
    /// `RepositoryError::Conflict` if the plate is registered to another.
    pub async fn update(
        &self,
        id: VehicleId,
        plate: &str,
        input: &VehicleInput,
        actor: &str,
    ) -> Result<Vehicle, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.vehicles
             SET apartment_id = $2, resident_id = $3, vehicle_type = $4, license_plate = $5,
                 color = $6, brand_model = $7, status = $8, updated_at = NOW(), updated_by = $9
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.apartment_id)
        .bind(input.resident_id)
        .bind(input.vehicle_type.as_str())
        .bind(plate)
        .bind(input.color.as_deref())
        .bind(input.brand_model.as_deref())
        .bind(input.status.as_str())
        .bind(actor)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, PLATE_TAKEN))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vehicle does not exist.
    pub async fn set_status(
        &self,
        id: VehicleId,
        status: VehicleStatus,
        actor: &str,
    ) -> Result<Vehicle, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.vehicles
             SET status = $2, updated_at = NOW(), updated_by = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(actor)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// ACTIVE vehicles per apartment, by kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` for an unknown vehicle type.
    pub async fn active_counts(&self) -> Result<HashMap<ApartmentId, VehicleCounts>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ApartmentId, String, i64)>(
            "SELECT apartment_id, vehicle_type, COUNT(*)
             FROM building.vehicles
             WHERE status = $1
             GROUP BY apartment_id, vehicle_type",
        )
        .bind(VehicleStatus::Active.as_str())
        .fetch_all(self.pool)
        .await?;

        let mut counts: HashMap<ApartmentId, VehicleCounts> = HashMap::new();
        for (apartment_id, kind, n) in rows {
            let kind = parse_column::<VehicleType>(&kind, "vehicle_type")?;
            counts
                .entry(apartment_id)
                .or_default()
                .add(kind, u32::try_from(n).unwrap_or(u32::MAX));
        }
        Ok(counts)
    }
}
