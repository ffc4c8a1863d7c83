//! Floors, apartments and residents.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sams_core::{ApartmentId, ApartmentStatus, FloorId, ResidentId, UserId};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub id: FloorId,
    pub floor_number: i32,
    pub name: Option<String>,
    pub apartment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorInput {
    pub floor_number: i32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Apartment {
    pub id: ApartmentId,
    pub floor_id: FloorId,
    pub floor_number: i32,
    pub number: String,
    pub area_m2: Option<Decimal>,
    pub bedrooms: Option<i32>,
    pub apartment_type: Option<String>,
    pub status: ApartmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentInput {
    pub floor_id: FloorId,
    pub number: String,
    pub area_m2: Option<Decimal>,
    pub bedrooms: Option<i32>,
    pub apartment_type: Option<String>,
    #[serde(default)]
    pub status: ApartmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentFilter {
    pub number: Option<String>,
    pub floor_id: Option<FloorId>,
    pub status: Option<ApartmentStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for ApartmentFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: ResidentId,
    pub user_id: Option<UserId>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub id_number: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub status: String,
    pub apartments: Vec<ResidentApartment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentApartment {
    pub apartment_id: ApartmentId,
    pub apartment_number: String,
    pub relation_type: String,
    pub is_primary: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentInput {
    pub user_id: Option<UserId>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub id_number: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentLinkInput {
    pub apartment_id: ApartmentId,
    pub relation_type: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentFilter {
    /// Matches name, phone, email or ID number.
    pub q: Option<String>,
    pub apartment_id: Option<ApartmentId>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for ResidentFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

/// Who to notify about an apartment's invoices and bookings.
#[derive(Debug, Clone)]
pub struct ApartmentContact {
    pub full_name: String,
    pub email: String,
}
