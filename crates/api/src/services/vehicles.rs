//! Vehicle registration. ACTIVE vehicles drive the monthly parking lines.

use sqlx::PgPool;

use sams_core::{Page, VehicleId, VehicleStatus};

use super::ServiceError;
use crate::db::{ApartmentRepository, RepositoryError, ResidentRepository, VehicleRepository};
use crate::models::session::CurrentUser;
use crate::models::vehicle::{Vehicle, VehicleFilter, VehicleInput};

/// Vehicle business rules.
pub struct VehicleService<'a> {
    pool: &'a PgPool,
    vehicles: VehicleRepository<'a>,
}

impl<'a> VehicleService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            vehicles: VehicleRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &VehicleFilter) -> Result<Page<Vehicle>, ServiceError> {
        Ok(self.vehicles.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the vehicle does not exist.
    pub async fn get(&self, id: VehicleId) -> Result<Vehicle, ServiceError> {
        self.vehicles
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Xe không tồn tại"))
    }

    /// Register a vehicle to an apartment.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed plate or an
    /// unknown apartment or resident, and `ServiceError::Conflict` when the
    /// plate is already registered.
    pub async fn create(
        &self,
        input: &VehicleInput,
        caller: &CurrentUser,
    ) -> Result<Vehicle, ServiceError> {
        let plate = normalize_plate(&input.license_plate)?;
        self.check_owner(input).await?;
        let created = self
            .vehicles
            .create(&plate, input, &caller.username)
            .await
            .map_err(|e| plate_conflict(e, &plate))?;
        tracing::info!(
            vehicle_id = %created.id,
            kind = %created.vehicle_type,
            apartment_id = %created.apartment_id,
            by = %caller.username,
            "Vehicle added"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns the same errors as [`Self::create`], or
    /// `ServiceError::NotFound` for an unknown vehicle.
    pub async fn update(
        &self,
        id: VehicleId,
        input: &VehicleInput,
        caller: &CurrentUser,
    ) -> Result<Vehicle, ServiceError> {
        self.get(id).await?;
        let plate = normalize_plate(&input.license_plate)?;
        self.check_owner(input).await?;
        self.vehicles
            .update(id, &plate, input, &caller.username)
            .await
            .map_err(|e| plate_conflict(e, &plate))
    }

    /// Activate or deactivate a vehicle.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` when the vehicle already has
    /// that status.
    pub async fn set_status(
        &self,
        id: VehicleId,
        status: VehicleStatus,
        caller: &CurrentUser,
    ) -> Result<Vehicle, ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == status {
            return Err(ServiceError::invalid_state(match status {
                VehicleStatus::Inactive => "Xe đã được hủy trước đó",
                VehicleStatus::Active => "Xe đang hoạt động",
            }));
        }
        let updated = self.vehicles.set_status(id, status, &caller.username).await?;
        tracing::info!(vehicle_id = %id, status = %status, by = %caller.username, "Vehicle status changed");
        Ok(updated)
    }

    async fn check_owner(&self, input: &VehicleInput) -> Result<(), ServiceError> {
        ApartmentRepository::new(self.pool)
            .get(input.apartment_id)
            .await?
            .ok_or_else(|| ServiceError::validation("Không tìm thấy căn hộ"))?;
        if let Some(resident_id) = input.resident_id {
            let resident = ResidentRepository::new(self.pool)
                .get(resident_id)
                .await?
                .ok_or_else(|| ServiceError::validation("Không tìm thấy cư dân"))?;
            if !resident
                .apartments
                .iter()
                .any(|link| link.apartment_id == input.apartment_id)
            {
                return Err(ServiceError::validation("Cư dân không thuộc căn hộ đã chọn"));
            }
        }
        Ok(())
    }
}

/// Upper-case the plate and drop whitespace: `" 29a-123.45 "` becomes
/// `"29A-123.45"`.
fn normalize_plate(raw: &str) -> Result<String, ServiceError> {
    let plate: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    let valid_chars = plate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !(4..=15).contains(&plate.len()) || !valid_chars {
        return Err(ServiceError::validation("Biển số xe không hợp lệ"));
    }
    Ok(plate)
}

fn plate_conflict(err: RepositoryError, plate: &str) -> ServiceError {
    match err {
        RepositoryError::Conflict(_) => {
            ServiceError::Conflict(format!("Xe biển số {plate} đã được đăng ký"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate(" 29a-123.45 ").unwrap(), "29A-123.45");
        assert_eq!(normalize_plate("30 G 999 99").unwrap(), "30G99999");
        assert!(matches!(normalize_plate("ab"), Err(ServiceError::Validation(_))));
        assert!(matches!(normalize_plate("29A_12345"), Err(ServiceError::Validation(_))));
        assert!(matches!(
            normalize_plate("29A-123.45-999999"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_plate_is_a_conflict() {
        let err = plate_conflict(
            RepositoryError::Conflict("license plate already registered".into()),
            "29A-123.45",
        );
        assert_eq!(err.to_string(), "Xe biển số 29A-123.45 đã được đăng ký");
        assert!(matches!(
            plate_conflict(RepositoryError::NotFound, "29A-123.45"),
            ServiceError::Repository(_)
        ));
    }
}
