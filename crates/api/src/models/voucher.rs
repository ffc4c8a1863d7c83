//! Payment vouchers (phiếu chi).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sams_core::{
    ApartmentId, ServiceTypeId, TicketId, UserId, VoucherId, VoucherItemId, VoucherStatus,
};

use super::Paged;

/// The only voucher type this system issues.
pub const VOUCHER_TYPE_PAYMENT: &str = "PAYMENT";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: VoucherId,
    pub voucher_number: String,
    pub voucher_type: String,
    pub company_info: Option<String>,
    pub voucher_date: NaiveDate,
    pub total_amount: Decimal,
    pub description: Option<String>,
    pub status: VoucherStatus,
    pub ticket_id: Option<TicketId>,
    pub created_by: Option<UserId>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherItem {
    pub id: VoucherItemId,
    pub voucher_id: VoucherId,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
    pub service_type_id: Option<ServiceTypeId>,
    pub apartment_id: Option<ApartmentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherWithItems {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub items: Vec<VoucherItem>,
}

/// A priced voucher ready to insert with its items.
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub voucher_number: String,
    pub company_info: Option<String>,
    pub voucher_date: NaiveDate,
    pub description: Option<String>,
    pub status: VoucherStatus,
    pub ticket_id: Option<TicketId>,
    pub created_by: Option<UserId>,
    pub total_amount: Decimal,
    pub items: Vec<NewVoucherItem>,
}

#[derive(Debug, Clone)]
pub struct NewVoucherItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
    pub service_type_id: Option<ServiceTypeId>,
    pub apartment_id: Option<ApartmentId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherInput {
    pub voucher_number: Option<String>,
    pub company_info: Option<String>,
    pub voucher_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Used for a single default item when `items` is empty.
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<VoucherItemInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherItemInput {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    /// Defaults to `quantity × unit_price`.
    pub amount: Option<Decimal>,
    pub service_type_id: Option<ServiceTypeId>,
    pub apartment_id: Option<ApartmentId>,
}

/// Expense recorded against a ticket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketVoucherInput {
    pub service_type_id: Option<ServiceTypeId>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherStatusInput {
    pub status: VoucherStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherFilter {
    /// Matches voucher number, description or company.
    pub q: Option<String>,
    pub status: Option<VoucherStatus>,
    pub ticket_id: Option<TicketId>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for VoucherFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}
