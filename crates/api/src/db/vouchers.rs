//! Payment voucher (phiếu chi) repository.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{
    ApartmentId, Page, ServiceTypeId, TicketId, UserId, VoucherId, VoucherItemId, VoucherStatus,
};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::voucher::{
    NewVoucher, NewVoucherItem, VOUCHER_TYPE_PAYMENT, Voucher, VoucherFilter, VoucherItem,
    VoucherWithItems,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    id: VoucherId,
    voucher_number: String,
    voucher_type: String,
    company_info: Option<String>,
    voucher_date: NaiveDate,
    total_amount: Decimal,
    description: Option<String>,
    status: String,
    ticket_id: Option<TicketId>,
    created_by: Option<UserId>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = RepositoryError;

    fn try_from(row: VoucherRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            voucher_number: row.voucher_number,
            voucher_type: row.voucher_type,
            company_info: row.company_info,
            voucher_date: row.voucher_date,
            total_amount: row.total_amount,
            description: row.description,
            status: parse_column::<VoucherStatus>(&row.status, "status")?,
            ticket_id: row.ticket_id,
            created_by: row.created_by,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: VoucherItemId,
    voucher_id: VoucherId,
    description: Option<String>,
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
    amount: Decimal,
    service_type_id: Option<ServiceTypeId>,
    apartment_id: Option<ApartmentId>,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for VoucherItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            voucher_id: row.voucher_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            amount: row.amount,
            service_type_id: row.service_type_id,
            apartment_id: row.apartment_id,
            created_at: row.created_at,
        }
    }
}

const VOUCHER_COLUMNS: &str = "v.id, v.voucher_number, v.voucher_type, v.company_info, \
    v.voucher_date, v.total_amount, v.description, v.status, v.ticket_id, v.created_by, \
    v.approved_by, v.approved_at, v.created_at, v.updated_at";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &VoucherFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (v.voucher_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR v.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR v.company_info ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND v.status = ").push_bind(status.as_str());
    }
    if let Some(ticket_id) = filter.ticket_id {
        qb.push(" AND v.ticket_id = ").push_bind(ticket_id);
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND v.voucher_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND v.voucher_date <= ").push_bind(to);
    }
}

async fn insert_item(
    conn: &mut sqlx::PgConnection,
    voucher_id: VoucherId,
    item: &NewVoucherItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO building.voucher_items
            (id, voucher_id, description, quantity, unit_price, amount, service_type_id, apartment_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(VoucherItemId::new_v4())
    .bind(voucher_id)
    .bind(item.description.as_deref())
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.amount)
    .bind(item.service_type_id)
    .bind(item.apartment_id)
    .execute(conn)
    .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for payment vouchers.
pub struct VoucherRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VoucherRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &VoucherFilter) -> Result<Page<Voucher>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.vouchers v");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {VOUCHER_COLUMNS} FROM building.vouchers v"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY v.voucher_date DESC, v.created_at DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<VoucherRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: VoucherId) -> Result<Option<Voucher>, RepositoryError> {
        let row = sqlx::query_as::<_, VoucherRow>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM building.vouchers v WHERE v.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        id: VoucherId,
    ) -> Result<Option<VoucherWithItems>, RepositoryError> {
        let Some(voucher) = self.get(id).await? else {
            return Ok(None);
        };
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, voucher_id, description, quantity, unit_price, amount,
                    service_type_id, apartment_id, created_at
             FROM building.voucher_items
             WHERE voucher_id = $1
             ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(VoucherWithItems {
            voucher,
            items: rows.into_iter().map(Into::into).collect(),
        }))
    }

    /// The voucher already opened for a ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_ticket(&self, ticket_id: TicketId) -> Result<Option<Voucher>, RepositoryError> {
        let row = sqlx::query_as::<_, VoucherRow>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM building.vouchers v
             WHERE v.ticket_id = $1
             ORDER BY v.created_at
             LIMIT 1"
        ))
        .bind(ticket_id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_number(&self, voucher_number: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM building.vouchers WHERE voucher_number = $1)",
        )
        .bind(voucher_number)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a voucher and its items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the voucher number is taken.
    pub async fn create(&self, voucher: &NewVoucher) -> Result<VoucherWithItems, RepositoryError> {
        let id = VoucherId::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO building.vouchers
                (id, voucher_number, voucher_type, company_info, voucher_date, total_amount,
                 description, status, ticket_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(&voucher.voucher_number)
        .bind(VOUCHER_TYPE_PAYMENT)
        .bind(voucher.company_info.as_deref())
        .bind(voucher.voucher_date)
        .bind(voucher.total_amount)
        .bind(voucher.description.as_deref())
        .bind(voucher.status.as_str())
        .bind(voucher.ticket_id)
        .bind(voucher.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "voucher number already exists"))?;

        for item in &voucher.items {
            insert_item(&mut *tx, id, item).await?;
        }
        tx.commit().await?;

        tracing::info!(
            voucher_id = %id,
            voucher_number = %voucher.voucher_number,
            total = %voucher.total_amount,
            "Voucher created"
        );
        self.get_with_items(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace the header fields and all items of a voucher.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the voucher does not exist.
    pub async fn update(
        &self,
        id: VoucherId,
        voucher: &NewVoucher,
    ) -> Result<VoucherWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE building.vouchers
             SET voucher_number = $2, company_info = $3, voucher_date = $4,
                 total_amount = $5, description = $6, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&voucher.voucher_number)
        .bind(voucher.company_info.as_deref())
        .bind(voucher.voucher_date)
        .bind(voucher.total_amount)
        .bind(voucher.description.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "voucher number already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM building.voucher_items WHERE voucher_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for item in &voucher.items {
            insert_item(&mut *tx, id, item).await?;
        }
        tx.commit().await?;

        self.get_with_items(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Append an item and recompute the voucher total from all items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn add_item(
        &self,
        id: VoucherId,
        item: &NewVoucherItem,
    ) -> Result<VoucherWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_item(&mut *tx, id, item).await?;
        sqlx::query(
            "UPDATE building.vouchers
             SET total_amount = (SELECT COALESCE(SUM(amount), 0)
                                 FROM building.voucher_items WHERE voucher_id = $1),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_with_items(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Set the status. Approval records the approver and time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the voucher does not exist.
    pub async fn set_status(
        &self,
        id: VoucherId,
        status: VoucherStatus,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Voucher, RepositoryError> {
        let approved = matches!(status, VoucherStatus::Approved);
        let result = sqlx::query(
            "UPDATE building.vouchers
             SET status = $2,
                 approved_by = CASE WHEN $3 THEN $4 ELSE approved_by END,
                 approved_at = CASE WHEN $3 THEN $5 ELSE approved_at END,
                 updated_at = $5
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(approved)
        .bind(actor)
        .bind(now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the voucher does not exist.
    pub async fn delete(&self, id: VoucherId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.vouchers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
