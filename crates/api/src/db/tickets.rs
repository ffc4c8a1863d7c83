//! Ticket repository: tickets, comments and finance blockers.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{
    ApartmentId, CommentId, InvoiceStatus, Page, TicketCategory, TicketId, TicketPriority,
    TicketScope, TicketStatus, UserId, VoucherStatus,
};

use super::{RepositoryError, parse_column};
use crate::models::Paged;
use crate::models::ticket::{
    FinanceBlockers, NewTicket, Ticket, TicketChanges, TicketComment, TicketFilter,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: TicketId,
    created_by_user_id: Option<UserId>,
    created_by_name: Option<String>,
    category: String,
    priority: String,
    subject: String,
    description: Option<String>,
    status: String,
    scope: String,
    apartment_id: Option<ApartmentId>,
    apartment_number: Option<String>,
    has_invoice: bool,
    expected_completion_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = RepositoryError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            created_by_user_id: row.created_by_user_id,
            created_by_name: row.created_by_name,
            category: parse_column::<TicketCategory>(&row.category, "category")?,
            priority: parse_column::<TicketPriority>(&row.priority, "priority")?,
            subject: row.subject,
            description: row.description,
            status: parse_column::<TicketStatus>(&row.status, "status")?,
            scope: parse_column::<TicketScope>(&row.scope, "scope")?,
            apartment_id: row.apartment_id,
            apartment_number: row.apartment_number,
            has_invoice: row.has_invoice,
            expected_completion_at: row.expected_completion_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            closed_at: row.closed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: CommentId,
    ticket_id: TicketId,
    commented_by: Option<UserId>,
    commenter_name: Option<String>,
    content: String,
    is_system: bool,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for TicketComment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            ticket_id: row.ticket_id,
            commented_by: row.commented_by,
            commenter_name: row.commenter_name,
            content: row.content,
            is_system: row.is_system,
            created_at: row.created_at,
        }
    }
}

const TICKET_SELECT: &str = "
    SELECT t.id, t.created_by_user_id, u.full_name AS created_by_name, t.category,
           t.priority, t.subject, t.description, t.status, t.scope, t.apartment_id,
           a.number AS apartment_number, t.has_invoice, t.expected_completion_at,
           t.created_at, t.updated_at, t.closed_at
    FROM building.tickets t
    LEFT JOIN building.users u ON u.id = t.created_by_user_id
    LEFT JOIN building.apartments a ON a.id = t.apartment_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND t.priority = ").push_bind(priority.as_str());
    }
    if let Some(category) = filter.category {
        qb.push(" AND t.category = ").push_bind(category.as_str());
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(" AND t.apartment_id = ").push_bind(apartment_id);
    }
    if let Some(created_by) = filter.created_by {
        qb.push(" AND t.created_by_user_id = ").push_bind(created_by);
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (t.subject ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND t.created_at::date >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND t.created_at::date <= ").push_bind(to);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for service tickets.
pub struct TicketRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search tickets, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &TicketFilter) -> Result<Page<Ticket>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.tickets t");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(TICKET_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY t.created_at DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<TicketRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!("{TICKET_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, ticket: &NewTicket) -> Result<Ticket, RepositoryError> {
        let id = TicketId::new_v4();
        sqlx::query(
            "INSERT INTO building.tickets
                (id, created_by_user_id, category, priority, subject, description,
                 status, scope, apartment_id, expected_completion_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(ticket.created_by_user_id)
        .bind(ticket.category.as_str())
        .bind(ticket.priority.as_str())
        .bind(&ticket.subject)
        .bind(ticket.description.as_deref())
        .bind(TicketStatus::New.as_str())
        .bind(ticket.scope.as_str())
        .bind(ticket.apartment_id)
        .bind(ticket.expected_completion_at)
        .execute(self.pool)
        .await?;

        tracing::info!(ticket_id = %id, category = %ticket.category, "Ticket created");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn update(
        &self,
        id: TicketId,
        changes: &TicketChanges,
    ) -> Result<Ticket, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.tickets
             SET category = $2, priority = $3, subject = $4, description = $5,
                 scope = $6, apartment_id = $7,
                 expected_completion_at = COALESCE($8, expected_completion_at),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(changes.category.as_str())
        .bind(changes.priority.as_str())
        .bind(&changes.subject)
        .bind(changes.description.as_deref())
        .bind(changes.scope.as_str())
        .bind(changes.apartment_id)
        .bind(changes.expected_completion_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Set the status, stamping `closed_at` when the ticket closes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn set_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let closed_at = status.is_closed().then_some(now);
        let result = sqlx::query(
            "UPDATE building.tickets
             SET status = $2, updated_at = $3, closed_at = COALESCE($4, closed_at)
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .bind(closed_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_has_invoice(&self, id: TicketId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE building.tickets SET has_invoice = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a ticket and its comments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if invoices or vouchers reference it.
    pub async fn delete(&self, id: TicketId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.tickets WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    RepositoryError::Conflict(
                        "ticket has invoices or vouchers attached".to_owned(),
                    )
                }
                other => other.into(),
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // ===== Comments =====

    /// Comments in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn comments(&self, id: TicketId) -> Result<Vec<TicketComment>, RepositoryError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.ticket_id, c.commented_by, u.full_name AS commenter_name,
                    c.content, c.is_system, c.created_at
             FROM building.ticket_comments c
             LEFT JOIN building.users u ON u.id = c.commented_by
             WHERE c.ticket_id = $1
             ORDER BY c.created_at, c.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append a comment. System comments record automated changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_comment(
        &self,
        id: TicketId,
        author: Option<UserId>,
        content: &str,
        is_system: bool,
    ) -> Result<TicketComment, RepositoryError> {
        let comment_id = CommentId::new_v4();
        sqlx::query(
            "INSERT INTO building.ticket_comments (id, ticket_id, commented_by, content, is_system)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(comment_id)
        .bind(id)
        .bind(author)
        .bind(content)
        .bind(is_system)
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.ticket_id, c.commented_by, u.full_name AS commenter_name,
                    c.content, c.is_system, c.created_at
             FROM building.ticket_comments c
             LEFT JOIN building.users u ON u.id = c.commented_by
             WHERE c.id = $1",
        )
        .bind(comment_id)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    // ===== Finance =====

    /// Unpaid invoices and unapproved vouchers attached to a ticket.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn finance_blockers(&self, id: TicketId) -> Result<FinanceBlockers, RepositoryError> {
        let unpaid: Vec<&str> = InvoiceStatus::ALL
            .iter()
            .filter(|s| s.is_unpaid())
            .map(|s| s.as_str())
            .collect();
        let unpaid_invoices = sqlx::query_scalar::<_, String>(
            "SELECT invoice_no FROM building.invoices
             WHERE ticket_id = $1 AND status = ANY($2)
             ORDER BY invoice_no",
        )
        .bind(id)
        .bind(&unpaid)
        .fetch_all(self.pool)
        .await?;

        let unapproved_vouchers = sqlx::query_scalar::<_, String>(
            "SELECT voucher_number FROM building.vouchers
             WHERE ticket_id = $1 AND status <> $2
             ORDER BY voucher_number",
        )
        .bind(id)
        .bind(VoucherStatus::Approved.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(FinanceBlockers {
            unpaid_invoices,
            unapproved_vouchers,
        })
    }
}
