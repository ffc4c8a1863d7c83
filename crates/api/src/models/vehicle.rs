//! Vehicles registered to apartments for parking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{ApartmentId, ResidentId, VehicleId, VehicleStatus, VehicleType};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub apartment_id: ApartmentId,
    pub apartment_number: Option<String>,
    pub resident_id: Option<ResidentId>,
    pub vehicle_type: VehicleType,
    pub license_plate: String,
    pub color: Option<String>,
    pub brand_model: Option<String>,
    pub status: VehicleStatus,
    pub registered_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInput {
    pub apartment_id: ApartmentId,
    pub resident_id: Option<ResidentId>,
    pub vehicle_type: VehicleType,
    pub license_plate: String,
    pub color: Option<String>,
    pub brand_model: Option<String>,
    #[serde(default)]
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatusInput {
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFilter {
    /// Matches the license plate.
    pub q: Option<String>,
    pub apartment_id: Option<ApartmentId>,
    pub vehicle_type: Option<VehicleType>,
    pub status: Option<VehicleStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for VehicleFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

/// ACTIVE vehicles of one apartment, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleCounts {
    pub motorbikes: u32,
    pub cars: u32,
}

impl VehicleCounts {
    #[must_use]
    pub const fn of(&self, kind: VehicleType) -> u32 {
        match kind {
            VehicleType::Motorbike => self.motorbikes,
            VehicleType::Car => self.cars,
        }
    }

    pub fn add(&mut self, kind: VehicleType, count: u32) {
        match kind {
            VehicleType::Motorbike => self.motorbikes += count,
            VehicleType::Car => self.cars += count,
        }
    }
}
