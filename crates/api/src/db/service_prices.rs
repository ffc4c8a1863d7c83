//! Effective-dated service prices.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{DateRange, Page, PriceStatus, ServicePriceId, ServiceTypeId};

use super::{RepositoryError, parse_column};
use crate::models::Paged;
use crate::models::invoice::{ServicePrice, ServicePriceFilter, ServicePriceInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    id: ServicePriceId,
    service_type_id: ServiceTypeId,
    unit_price: Decimal,
    effective_date: NaiveDate,
    end_date: Option<NaiveDate>,
    status: String,
    notes: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PriceRow> for ServicePrice {
    type Error = RepositoryError;

    fn try_from(row: PriceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            service_type_id: row.service_type_id,
            unit_price: row.unit_price,
            effective_date: row.effective_date,
            end_date: row.end_date,
            status: parse_column::<PriceStatus>(&row.status, "status")?,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "id, service_type_id, unit_price, effective_date, end_date, status, notes, \
                       created_by, created_at, updated_at";

/// Last day bound for an overlap query; `None` for an open-ended range.
fn bound_end(period: DateRange) -> Option<NaiveDate> {
    (!period.is_open_ended()).then(|| period.end())
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    service_type_id: ServiceTypeId,
    filter: &ServicePriceFilter,
) {
    qb.push(" WHERE service_type_id = ").push_bind(service_type_id);
    if let Some(from) = filter.from_date {
        qb.push(" AND (end_date IS NULL OR end_date >= ").push_bind(from).push(")");
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND effective_date <= ").push_bind(to);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for service price periods.
pub struct ServicePriceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ServicePriceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Prices of one service type, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        service_type_id: ServiceTypeId,
        filter: &ServicePriceFilter,
    ) -> Result<Page<ServicePrice>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.service_prices");
        push_filters(&mut count, service_type_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM building.service_prices"
        ));
        push_filters(&mut qb, service_type_id, filter);
        qb.push(" ORDER BY effective_date DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<PriceRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ServicePriceId) -> Result<Option<ServicePrice>, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_prices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// A live price of the service whose days intersect `period`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn overlapping(
        &self,
        service_type_id: ServiceTypeId,
        period: DateRange,
        exclude: Option<ServicePriceId>,
    ) -> Result<Option<ServicePrice>, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_prices
             WHERE service_type_id = $1
               AND status <> $2
               AND ($3::uuid IS NULL OR id <> $3)
               AND ($4::date IS NULL OR effective_date <= $4)
               AND (end_date IS NULL OR end_date >= $5)
             ORDER BY effective_date
             LIMIT 1"
        ))
        .bind(service_type_id)
        .bind(PriceStatus::Cancelled.as_str())
        .bind(exclude)
        .bind(bound_end(period))
        .bind(period.start())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// The live price of the service that has no end date yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_ended(
        &self,
        service_type_id: ServiceTypeId,
    ) -> Result<Option<ServicePrice>, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "SELECT {COLUMNS} FROM building.service_prices
             WHERE service_type_id = $1 AND status <> $2 AND end_date IS NULL
             ORDER BY effective_date DESC
             LIMIT 1"
        ))
        .bind(service_type_id)
        .bind(PriceStatus::Cancelled.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Insert a price, first ending `close` on the given day, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the price to close vanished.
    pub async fn create(
        &self,
        service_type_id: ServiceTypeId,
        input: &ServicePriceInput,
        close: Option<(ServicePriceId, NaiveDate)>,
        actor: &str,
    ) -> Result<ServicePrice, RepositoryError> {
        let id = ServicePriceId::new_v4();
        let mut tx = self.pool.begin().await?;

        if let Some((previous, end_date)) = close {
            let result = sqlx::query(
                "UPDATE building.service_prices
                 SET end_date = $2, updated_at = NOW()
                 WHERE id = $1 AND end_date IS NULL",
            )
            .bind(previous)
            .bind(end_date)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        sqlx::query(
            "INSERT INTO building.service_prices
                (id, service_type_id, unit_price, effective_date, end_date, status, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(service_type_id)
        .bind(input.unit_price)
        .bind(input.effective_date)
        .bind(input.end_date)
        .bind(PriceStatus::Approved.as_str())
        .bind(input.notes.as_deref())
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the price does not exist.
    pub async fn update(
        &self,
        id: ServicePriceId,
        input: &ServicePriceInput,
    ) -> Result<ServicePrice, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "UPDATE building.service_prices
             SET unit_price = $2, effective_date = $3, end_date = $4,
                 notes = COALESCE($5, notes), updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(input.unit_price)
        .bind(input.effective_date)
        .bind(input.end_date)
        .bind(input.notes.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    /// Mark a price cancelled, ending it on `end_date` unless it already
    /// has an end.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the price does not exist.
    pub async fn cancel(&self, id: ServicePriceId, end_date: NaiveDate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.service_prices
             SET status = $2, end_date = COALESCE(end_date, $3), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(PriceStatus::Cancelled.as_str())
        .bind(end_date)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Unit price of one service in effect on `date`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn price_on(
        &self,
        service_type_id: ServiceTypeId,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let price = sqlx::query_scalar::<_, Decimal>(
            "SELECT unit_price FROM building.service_prices
             WHERE service_type_id = $1 AND status = $2
               AND effective_date <= $3 AND (end_date IS NULL OR end_date >= $3)
             ORDER BY effective_date DESC
             LIMIT 1",
        )
        .bind(service_type_id)
        .bind(PriceStatus::Approved.as_str())
        .bind(date)
        .fetch_optional(self.pool)
        .await?;
        Ok(price)
    }

    /// Unit price in effect on `date` for every priced service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prices_on(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<ServiceTypeId, Decimal>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ServiceTypeId, Decimal)>(
            "SELECT DISTINCT ON (service_type_id) service_type_id, unit_price
             FROM building.service_prices
             WHERE status = $1
               AND effective_date <= $2 AND (end_date IS NULL OR end_date >= $2)
             ORDER BY service_type_id, effective_date DESC",
        )
        .bind(PriceStatus::Approved.as_str())
        .bind(date)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn test_open_ended_period_binds_no_end() {
        let open = DateRange::open_ended(d(2025, 1, 1), None).expect("range");
        assert_eq!(bound_end(open), None);
        let closed = DateRange::new(d(2025, 1, 1), d(2025, 6, 30)).expect("range");
        assert_eq!(bound_end(closed), Some(d(2025, 6, 30)));
    }
}
