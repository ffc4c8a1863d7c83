//! Payment receipts. An invoice is settled by exactly one receipt.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sams_core::{InvoiceId, PaymentMethod, ReceiptId, UserId};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: ReceiptId,
    pub invoice_id: InvoiceId,
    pub invoice_no: Option<String>,
    pub apartment_number: Option<String>,
    pub receipt_no: String,
    pub received_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub amount_total: Decimal,
    pub note: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInput {
    pub invoice_id: InvoiceId,
    /// Generated from the invoice number and received date when blank.
    pub receipt_no: Option<String>,
    /// Defaults to now.
    pub received_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub method: PaymentMethod,
    /// Must equal the invoice total.
    pub amount_total: Decimal,
    pub note: Option<String>,
}

/// A validated receipt ready to insert.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub invoice_id: InvoiceId,
    pub receipt_no: String,
    pub received_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub amount_total: Decimal,
    pub note: Option<String>,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFilter {
    /// Matches receipt or invoice number.
    pub q: Option<String>,
    pub method: Option<PaymentMethod>,
    pub received_from: Option<NaiveDate>,
    pub received_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for ReceiptFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}
