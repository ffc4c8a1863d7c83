//! Receipt repository. Recording a receipt settles its invoice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{InvoiceId, InvoiceStatus, Page, PaymentMethod, ReceiptId, UserId};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::receipt::{NewReceipt, Receipt, ReceiptFilter};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: ReceiptId,
    invoice_id: InvoiceId,
    invoice_no: Option<String>,
    apartment_number: Option<String>,
    receipt_no: String,
    received_date: DateTime<Utc>,
    method: String,
    amount_total: Decimal,
    note: Option<String>,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = RepositoryError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            invoice_id: row.invoice_id,
            invoice_no: row.invoice_no,
            apartment_number: row.apartment_number,
            receipt_no: row.receipt_no,
            received_date: row.received_date,
            method: parse_column::<PaymentMethod>(&row.method, "method")?,
            amount_total: row.amount_total,
            note: row.note,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const RECEIPT_SELECT: &str = "
    SELECT r.id, r.invoice_id, i.invoice_no, a.number AS apartment_number, r.receipt_no,
           r.received_date, r.method, r.amount_total, r.note, r.created_by, r.created_at
    FROM building.receipts r
    LEFT JOIN building.invoices i ON i.id = r.invoice_id
    LEFT JOIN building.apartments a ON a.id = i.apartment_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReceiptFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (r.receipt_no ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.invoice_no ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(method) = filter.method {
        qb.push(" AND r.method = ").push_bind(method.as_str());
    }
    if let Some(from) = filter.received_from {
        qb.push(" AND r.received_date::date >= ").push_bind(from);
    }
    if let Some(to) = filter.received_to {
        qb.push(" AND r.received_date::date <= ").push_bind(to);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for payment receipts.
pub struct ReceiptRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReceiptRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ReceiptFilter) -> Result<Page<Receipt>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM building.receipts r
             LEFT JOIN building.invoices i ON i.id = r.invoice_id",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(RECEIPT_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY r.received_date DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<ReceiptRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReceiptId) -> Result<Option<Receipt>, RepositoryError> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!("{RECEIPT_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_invoice(&self, invoice_id: InvoiceId) -> Result<Option<Receipt>, RepositoryError> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!(
            "{RECEIPT_SELECT} WHERE r.invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Insert the receipt and move its invoice from `expected` to PAID in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the invoice already has a
    /// receipt, the number is taken, or the invoice left `expected` in the
    /// meantime. Nothing is written in that case.
    pub async fn create_and_settle(
        &self,
        receipt: &NewReceipt,
        expected: InvoiceStatus,
        actor: &str,
    ) -> Result<Receipt, RepositoryError> {
        let id = ReceiptId::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO building.receipts
                (id, invoice_id, receipt_no, received_date, method, amount_total, note, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(receipt.invoice_id)
        .bind(&receipt.receipt_no)
        .bind(receipt.received_date)
        .bind(receipt.method.as_str())
        .bind(receipt.amount_total)
        .bind(receipt.note.as_deref())
        .bind(receipt.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "invoice already has a receipt or the number is taken"))?;

        let settled = sqlx::query(
            "UPDATE building.invoices
             SET status = $3, updated_at = NOW(), updated_by = $4
             WHERE id = $1 AND status = $2",
        )
        .bind(receipt.invoice_id)
        .bind(expected.as_str())
        .bind(InvoiceStatus::Paid.as_str())
        .bind(actor)
        .execute(&mut *tx)
        .await?;
        if settled.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "invoice status changed while recording the receipt".to_string(),
            ));
        }

        tx.commit().await?;
        tracing::info!(receipt_id = %id, receipt_no = %receipt.receipt_no, invoice_id = %receipt.invoice_id, "Receipt recorded");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }
}
