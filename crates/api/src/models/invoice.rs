//! Invoices, their lines, billable service types and the monthly
//! generation settings.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sams_core::{
    ApartmentId, DateRange, InvoiceDetailId, InvoiceId, InvoiceStatus, InvoiceTotals,
    LineAmounts, PeriodError, PriceStatus, ServicePriceId, ServiceTypeId, TicketId,
};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub is_recurring: bool,
    pub is_area_based: bool,
    pub is_active: bool,
}

/// A service type's unit price over a span of days.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrice {
    pub id: ServicePriceId,
    pub service_type_id: ServiceTypeId,
    pub unit_price: Decimal,
    pub effective_date: NaiveDate,
    /// `None` while the price applies until further notice.
    pub end_date: Option<NaiveDate>,
    pub status: PriceStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServicePrice {
    /// Days the price covers.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if the stored dates are reversed.
    pub fn period(&self) -> Result<DateRange, PeriodError> {
        DateRange::open_ended(self.effective_date, self.end_date)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePriceInput {
    pub unit_price: Decimal,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePriceFilter {
    /// Prices still in effect on or after this day.
    pub from_date: Option<NaiveDate>,
    /// Prices starting on or before this day.
    pub to_date: Option<NaiveDate>,
    pub status: Option<PriceStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for ServicePriceFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPriceQuery {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPrice {
    pub service_type_id: ServiceTypeId,
    pub date: NaiveDate,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub apartment_id: ApartmentId,
    pub apartment_number: Option<String>,
    pub ticket_id: Option<TicketId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub subtotal_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    pub id: InvoiceDetailId,
    pub invoice_id: InvoiceId,
    pub service_type_id: ServiceTypeId,
    pub service_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub vat_rate: Option<Decimal>,
    pub vat_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceWithDetails {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub details: Vec<InvoiceDetail>,
}

/// A fully priced invoice ready to insert with its lines.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_no: String,
    pub apartment_id: ApartmentId,
    pub ticket_id: Option<TicketId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub note: Option<String>,
    pub created_by: Option<String>,
    pub totals: InvoiceTotals,
    pub details: Vec<NewInvoiceDetail>,
}

#[derive(Debug, Clone)]
pub struct NewInvoiceDetail {
    pub service_type_id: ServiceTypeId,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Option<Decimal>,
    pub amounts: LineAmounts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    /// Optional; replaced with a generated number when blank or taken.
    pub invoice_no: Option<String>,
    pub apartment_id: ApartmentId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub note: Option<String>,
    #[serde(default)]
    pub details: Vec<InvoiceDetailInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetailInput {
    pub service_type_id: ServiceTypeId,
    pub description: Option<String>,
    pub quantity: Decimal,
    /// Defaults to the price in effect on the issue date, then to the
    /// service type's list price.
    pub unit_price: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
}

/// Invoice raised for a ticket; the apartment comes from the ticket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketInvoiceInput {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub details: Vec<InvoiceDetailInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceUpdateInput {
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatusInput {
    pub status: InvoiceStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    /// Matches invoice number or note.
    pub q: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub apartment_id: Option<ApartmentId>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for InvoiceFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceConfiguration {
    pub generation_day_of_month: u32,
    pub due_days_after_issue: u32,
    pub is_enabled: bool,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Default for InvoiceConfiguration {
    fn default() -> Self {
        Self {
            generation_day_of_month: 1,
            due_days_after_issue: 40,
            is_enabled: true,
            notes: None,
            updated_at: None,
            updated_by: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceConfigInput {
    pub generation_day_of_month: u32,
    pub due_days_after_issue: u32,
    pub is_enabled: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGenerationInput {
    pub year: i32,
    pub month: u32,
}

/// Outcome of a monthly generation run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGenerationReport {
    pub period: String,
    pub created: Vec<String>,
    pub skipped_existing: usize,
    pub skipped_empty: usize,
    pub failed: Vec<String>,
}
