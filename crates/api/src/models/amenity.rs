//! Amenities, their packages and resident bookings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{
    AmenityId, AmenityStatus, ApartmentId, AssetId, BookingId, BookingStatus, PackageId,
    PaymentStatus, PeriodUnit, UserId,
};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenity {
    pub id: AmenityId,
    pub asset_id: Option<AssetId>,
    pub code: String,
    pub name: String,
    pub category_name: Option<String>,
    pub location: Option<String>,
    pub has_monthly_package: bool,
    pub fee_type: String,
    pub status: AmenityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityInput {
    pub asset_id: Option<AssetId>,
    pub code: String,
    pub name: String,
    pub category_name: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub has_monthly_package: bool,
    pub fee_type: Option<String>,
    #[serde(default)]
    pub status: AmenityStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityPackage {
    pub id: PackageId,
    pub amenity_id: AmenityId,
    pub name: String,
    pub month_count: u32,
    pub duration_days: Option<u32>,
    pub period_unit: PeriodUnit,
    pub price: i32,
    pub description: Option<String>,
    pub status: AmenityStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInput {
    pub name: String,
    #[serde(default = "one")]
    pub month_count: u32,
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub period_unit: PeriodUnit,
    pub price: i32,
    pub description: Option<String>,
    #[serde(default)]
    pub status: AmenityStatus,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub amenity_id: AmenityId,
    pub amenity_name: Option<String>,
    pub package_id: PackageId,
    pub package_name: Option<String>,
    pub apartment_id: ApartmentId,
    pub apartment_number: Option<String>,
    pub user_id: Option<UserId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i32,
    pub total_price: i32,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

/// A priced booking ready to insert.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub amenity_id: AmenityId,
    pub package_id: PackageId,
    pub apartment_id: ApartmentId,
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i32,
    pub notes: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub amenity_id: AmenityId,
    pub package_id: PackageId,
    /// Required for staff; residents book for their primary apartment.
    pub apartment_id: Option<ApartmentId>,
    /// Resident account a staff booking is made for. Defaults to the
    /// apartment's primary resident.
    pub user_id: Option<UserId>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdateInput {
    pub package_id: PackageId,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInput {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusInput {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub package_id: PackageId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQuote {
    pub package_id: PackageId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i32,
    pub total_price: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
    pub amenity_id: Option<AmenityId>,
    pub apartment_id: Option<ApartmentId>,
    pub user_id: Option<UserId>,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// `startDate`, `endDate`, `createdAt` or `price`.
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for BookingFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}
