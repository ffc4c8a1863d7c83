//! Receipts: recording a payment settles the invoice.

use chrono::NaiveDate;
use sqlx::PgPool;

use sams_core::{InvoiceId, InvoiceStatus, Page, ReceiptId};

use super::email::format_vnd;
use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{InvoiceRepository, ReceiptRepository};
use crate::models::invoice::Invoice;
use crate::models::receipt::{NewReceipt, Receipt, ReceiptFilter, ReceiptInput};
use crate::models::session::CurrentUser;

/// Receipt business rules.
pub struct ReceiptService<'a> {
    pool: &'a PgPool,
    receipts: ReceiptRepository<'a>,
    clock: BuildingClock,
}

impl<'a> ReceiptService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            pool,
            receipts: ReceiptRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &ReceiptFilter) -> Result<Page<Receipt>, ServiceError> {
        Ok(self.receipts.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the receipt does not exist.
    pub async fn get(&self, id: ReceiptId) -> Result<Receipt, ServiceError> {
        self.receipts
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy phiếu thu"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the invoice has no receipt.
    pub async fn for_invoice(&self, invoice_id: InvoiceId) -> Result<Receipt, ServiceError> {
        self.receipts
            .for_invoice(invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Hóa đơn chưa có phiếu thu"))
    }

    /// Record the payment of an invoice and mark it PAID.
    ///
    /// A blank receipt number becomes `REC-{invoiceNo}-yyyy/MM/dd` from the
    /// received date in building time.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown invoice,
    /// `ServiceError::Conflict` when it already has a receipt,
    /// `ServiceError::InvalidState` when it cannot be paid, and
    /// `ServiceError::Validation` when the amount differs from its total.
    pub async fn create(
        &self,
        input: &ReceiptInput,
        caller: &CurrentUser,
    ) -> Result<Receipt, ServiceError> {
        let invoice = InvoiceRepository::new(self.pool)
            .get(input.invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy hóa đơn"))?;

        if let Some(existing) = self.receipts.for_invoice(invoice.id).await? {
            return Err(ServiceError::Conflict(format!(
                "Hóa đơn {} đã có phiếu thu {}",
                invoice.invoice_no, existing.receipt_no
            )));
        }
        invoice.status.check_transition(InvoiceStatus::Paid)?;
        check_amount(&invoice, input)?;

        let received_date = input.received_date.unwrap_or_else(|| self.clock.now());
        let receipt_no = non_blank(input.receipt_no.as_deref()).unwrap_or_else(|| {
            receipt_number(&invoice.invoice_no, self.clock.local(received_date).date())
        });

        let receipt = NewReceipt {
            invoice_id: invoice.id,
            receipt_no,
            received_date,
            method: input.method,
            amount_total: input.amount_total,
            note: non_blank(input.note.as_deref()),
            created_by: Some(caller.id),
        };
        let created = self
            .receipts
            .create_and_settle(&receipt, invoice.status, &caller.username)
            .await?;

        tracing::info!(
            receipt_no = %created.receipt_no,
            invoice_no = %invoice.invoice_no,
            amount = %created.amount_total,
            by = %caller.username,
            "Invoice paid"
        );
        Ok(created)
    }
}

/// `REC-{invoiceNo}-yyyy/MM/dd`.
fn receipt_number(invoice_no: &str, received: NaiveDate) -> String {
    format!("REC-{invoice_no}-{}", received.format("%Y/%m/%d"))
}

fn check_amount(invoice: &Invoice, input: &ReceiptInput) -> Result<(), ServiceError> {
    if input.amount_total != invoice.total_amount {
        return Err(ServiceError::Validation(format!(
            "Số tiền phiếu thu ({}) không khớp với tổng tiền hóa đơn ({})",
            format_vnd(input.amount_total),
            format_vnd(invoice.total_amount)
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sams_core::{ApartmentId, PaymentMethod};

    use super::*;

    fn invoice(total: i64) -> Invoice {
        Invoice {
            id: InvoiceId::new_v4(),
            invoice_no: "INV-202503-A1001".to_string(),
            apartment_id: ApartmentId::new_v4(),
            apartment_number: None,
            ticket_id: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
            status: InvoiceStatus::Issued,
            subtotal_amount: Decimal::from(total),
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::from(total),
            note: None,
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    fn input(invoice: &Invoice, amount: i64) -> ReceiptInput {
        ReceiptInput {
            invoice_id: invoice.id,
            receipt_no: None,
            received_date: None,
            method: PaymentMethod::BankTransfer,
            amount_total: Decimal::from(amount),
            note: None,
        }
    }

    #[test]
    fn test_receipt_number_format() {
        let received = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(
            receipt_number("INV-202501-A1001", received),
            "REC-INV-202501-A1001-2025/01/20"
        );
    }

    #[test]
    fn test_amount_must_match_invoice_total() {
        let invoice = invoice(1_051_600);
        assert!(check_amount(&invoice, &input(&invoice, 1_051_600)).is_ok());
        assert_eq!(
            check_amount(&invoice, &input(&invoice, 1_000_000))
                .unwrap_err()
                .to_string(),
            "Số tiền phiếu thu (1.000.000 ₫) không khớp với tổng tiền hóa đơn (1.051.600 ₫)"
        );
    }

    #[test]
    fn test_only_unpaid_issued_invoices_take_a_receipt() {
        assert!(InvoiceStatus::Issued.check_transition(InvoiceStatus::Paid).is_ok());
        assert!(InvoiceStatus::Overdue.check_transition(InvoiceStatus::Paid).is_ok());
        let draft: ServiceError = InvoiceStatus::Draft
            .check_transition(InvoiceStatus::Paid)
            .unwrap_err()
            .into();
        assert!(matches!(draft, ServiceError::InvalidState(_)));
    }
}
