//! Invoice repository: invoice headers and their detail lines.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{
    ApartmentId, InvoiceDetailId, InvoiceId, InvoiceStatus, MonthPeriod, Page, ServiceTypeId,
    TicketId,
};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::invoice::{
    Invoice, InvoiceDetail, InvoiceFilter, InvoiceWithDetails, NewInvoice, NewInvoiceDetail,
};
use crate::models::{Paged, sort_column, sort_direction};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("invoiceNo", "i.invoice_no"),
    ("issueDate", "i.issue_date"),
    ("dueDate", "i.due_date"),
    ("totalAmount", "i.total_amount"),
    ("createdAt", "i.created_at"),
];

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    invoice_no: String,
    apartment_id: ApartmentId,
    apartment_number: Option<String>,
    ticket_id: Option<TicketId>,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    subtotal_amount: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    note: Option<String>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = RepositoryError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            invoice_no: row.invoice_no,
            apartment_id: row.apartment_id,
            apartment_number: row.apartment_number,
            ticket_id: row.ticket_id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: parse_column::<InvoiceStatus>(&row.status, "status")?,
            subtotal_amount: row.subtotal_amount,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            note: row.note,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    id: InvoiceDetailId,
    invoice_id: InvoiceId,
    service_type_id: ServiceTypeId,
    service_name: Option<String>,
    description: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    amount: Decimal,
    vat_rate: Option<Decimal>,
    vat_amount: Decimal,
}

impl From<DetailRow> for InvoiceDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            service_type_id: row.service_type_id,
            service_name: row.service_name,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            amount: row.amount,
            vat_rate: row.vat_rate,
            vat_amount: row.vat_amount,
        }
    }
}

const INVOICE_SELECT: &str = "
    SELECT i.id, i.invoice_no, i.apartment_id, a.number AS apartment_number, i.ticket_id,
           i.issue_date, i.due_date, i.status, i.subtotal_amount, i.tax_amount,
           i.total_amount, i.note, i.created_at, i.created_by, i.updated_at, i.updated_by
    FROM building.invoices i
    LEFT JOIN building.apartments a ON a.id = i.apartment_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (i.invoice_no ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.note ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status.as_str());
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(" AND i.apartment_id = ").push_bind(apartment_id);
    }
    if let Some(from) = filter.due_from {
        qb.push(" AND i.due_date >= ").push_bind(from);
    }
    if let Some(to) = filter.due_to {
        qb.push(" AND i.due_date <= ").push_bind(to);
    }
}

async fn insert_detail(
    conn: &mut sqlx::PgConnection,
    invoice_id: InvoiceId,
    detail: &NewInvoiceDetail,
) -> Result<InvoiceDetailId, sqlx::Error> {
    let id = InvoiceDetailId::new_v4();
    sqlx::query(
        "INSERT INTO building.invoice_details
            (id, invoice_id, service_type_id, description, quantity, unit_price,
             amount, vat_rate, vat_amount)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(id)
    .bind(invoice_id)
    .bind(detail.service_type_id)
    .bind(detail.description.as_deref())
    .bind(detail.quantity)
    .bind(detail.unit_price)
    .bind(detail.amounts.amount)
    .bind(detail.vat_rate)
    .bind(detail.amounts.vat_amount)
    .execute(conn)
    .await?;
    Ok(id)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoices.
pub struct InvoiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InvoiceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paged invoice search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &InvoiceFilter) -> Result<Page<Invoice>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.invoices i");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let column = sort_column(filter.sort_by.as_deref(), SORT_COLUMNS, "i.created_at");
        let direction = sort_direction(filter.sort_dir.as_deref());

        let mut qb = QueryBuilder::<Postgres>::new(INVOICE_SELECT);
        push_filters(&mut qb, filter);
        qb.push(format!(" ORDER BY {column} {direction}, i.id LIMIT "))
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<InvoiceRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!("{INVOICE_SELECT} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Invoice header plus its detail lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_details(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceWithDetails>, RepositoryError> {
        let Some(invoice) = self.get(id).await? else {
            return Ok(None);
        };
        let details = self.details(id).await?;
        Ok(Some(InvoiceWithDetails { invoice, details }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn details(&self, id: InvoiceId) -> Result<Vec<InvoiceDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, DetailRow>(
            "SELECT d.id, d.invoice_id, d.service_type_id, s.name AS service_name,
                    d.description, d.quantity, d.unit_price, d.amount, d.vat_rate, d.vat_amount
             FROM building.invoice_details d
             LEFT JOIN building.service_types s ON s.id = d.service_type_id
             WHERE d.invoice_id = $1
             ORDER BY s.name, d.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Invoices raised from a ticket.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "{INVOICE_SELECT} WHERE i.ticket_id = $1 ORDER BY i.created_at"
        ))
        .bind(ticket_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_invoice_no(&self, invoice_no: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM building.invoices WHERE invoice_no = $1)",
        )
        .bind(invoice_no)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// A non-cancelled invoice issued to the apartment within the month.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_in_period(
        &self,
        apartment_id: ApartmentId,
        period: MonthPeriod,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "{INVOICE_SELECT}
             WHERE i.apartment_id = $1
               AND i.issue_date BETWEEN $2 AND $3
               AND i.status <> $4
               AND i.ticket_id IS NULL
             ORDER BY i.issue_date
             LIMIT 1"
        ))
        .bind(apartment_id)
        .bind(period.first_day())
        .bind(period.last_day())
        .bind(InvoiceStatus::Cancelled.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Insert an invoice and all its detail lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the invoice number is taken.
    /// Nothing is written when any statement fails.
    pub async fn create_with_details(
        &self,
        invoice: &NewInvoice,
    ) -> Result<InvoiceWithDetails, RepositoryError> {
        let id = InvoiceId::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO building.invoices
                (id, invoice_no, apartment_id, ticket_id, issue_date, due_date, status,
                 subtotal_amount, tax_amount, total_amount, note, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(id)
        .bind(&invoice.invoice_no)
        .bind(invoice.apartment_id)
        .bind(invoice.ticket_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(invoice.totals.subtotal_amount)
        .bind(invoice.totals.tax_amount)
        .bind(invoice.totals.total_amount)
        .bind(invoice.note.as_deref())
        .bind(invoice.created_by.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "invoice number already exists"))?;

        for detail in &invoice.details {
            insert_detail(&mut *tx, id, detail).await?;
        }

        tx.commit().await?;

        tracing::info!(
            invoice_id = %id,
            invoice_no = %invoice.invoice_no,
            lines = invoice.details.len(),
            total = %invoice.totals.total_amount,
            "Invoice created"
        );

        self.get_with_details(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Update dates and note on an invoice header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the invoice does not exist.
    pub async fn update_header(
        &self,
        id: InvoiceId,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        note: Option<&str>,
        actor: &str,
    ) -> Result<Invoice, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.invoices
             SET issue_date = $2, due_date = $3, note = $4, updated_at = NOW(), updated_by = $5
             WHERE id = $1",
        )
        .bind(id)
        .bind(issue_date)
        .bind(due_date)
        .bind(note)
        .bind(actor)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the invoice does not exist.
    pub async fn update_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        note: Option<&str>,
        actor: &str,
    ) -> Result<Invoice, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.invoices
             SET status = $2, note = $3, updated_at = NOW(), updated_by = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(note)
        .bind(actor)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the invoice does not exist.
    pub async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.invoices WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Append a detail line and recompute the invoice totals from all lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    pub async fn add_detail(
        &self,
        id: InvoiceId,
        detail: &NewInvoiceDetail,
        actor: &str,
    ) -> Result<InvoiceWithDetails, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        insert_detail(&mut *tx, id, detail).await?;

        sqlx::query(
            "UPDATE building.invoices i
             SET subtotal_amount = t.subtotal,
                 tax_amount = t.tax,
                 total_amount = t.subtotal + t.tax,
                 updated_at = NOW(),
                 updated_by = $2
             FROM (SELECT COALESCE(SUM(amount), 0) AS subtotal,
                          COALESCE(SUM(vat_amount), 0) AS tax
                   FROM building.invoice_details WHERE invoice_id = $1) t
             WHERE i.id = $1",
        )
        .bind(id)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_with_details(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Move every issued invoice past its due date to OVERDUE.
    ///
    /// Returns the number of invoices updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.invoices
             SET status = $1, updated_at = NOW(), updated_by = 'system'
             WHERE status = $2 AND due_date < $3",
        )
        .bind(InvoiceStatus::Overdue.as_str())
        .bind(InvoiceStatus::Issued.as_str())
        .bind(today)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
