//! Amenity booking repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{
    AmenityId, ApartmentId, BookingId, BookingStatus, DateRange, PackageId, Page, PaymentStatus,
    UserId,
};

use super::{RepositoryError, parse_column};
use crate::models::amenity::{Booking, BookingFilter, NewBooking};
use crate::models::{Paged, sort_column, sort_direction};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("startDate", "b.start_date"),
    ("endDate", "b.end_date"),
    ("createdAt", "b.created_at"),
    ("price", "b.total_price"),
];

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: BookingId,
    amenity_id: AmenityId,
    amenity_name: Option<String>,
    package_id: PackageId,
    package_name: Option<String>,
    apartment_id: ApartmentId,
    apartment_number: Option<String>,
    user_id: Option<UserId>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    price: i32,
    total_price: i32,
    status: String,
    payment_status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            amenity_id: row.amenity_id,
            amenity_name: row.amenity_name,
            package_id: row.package_id,
            package_name: row.package_name,
            apartment_id: row.apartment_id,
            apartment_number: row.apartment_number,
            user_id: row.user_id,
            start_date: row.start_date,
            end_date: row.end_date,
            price: row.price,
            total_price: row.total_price,
            status: parse_column::<BookingStatus>(&row.status, "status")?,
            payment_status: parse_column::<PaymentStatus>(&row.payment_status, "payment_status")?,
            notes: row.notes,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

const BOOKING_SELECT: &str = "
    SELECT b.id, b.amenity_id, am.name AS amenity_name, b.package_id, p.name AS package_name,
           b.apartment_id, ap.number AS apartment_number, b.user_id, b.start_date, b.end_date,
           b.price, b.total_price, b.status, b.payment_status, b.notes, b.created_at,
           b.created_by, b.updated_at, b.updated_by
    FROM building.amenity_bookings b
    LEFT JOIN building.amenities am ON am.id = b.amenity_id
    LEFT JOIN building.amenity_packages p ON p.id = b.package_id
    LEFT JOIN building.apartments ap ON ap.id = b.apartment_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    qb.push(" WHERE NOT b.is_deleted");
    if let Some(amenity_id) = filter.amenity_id {
        qb.push(" AND b.amenity_id = ").push_bind(amenity_id);
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(" AND b.apartment_id = ").push_bind(apartment_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND b.user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND b.status = ").push_bind(status.as_str());
    }
    if let Some(payment_status) = filter.payment_status {
        qb.push(" AND b.payment_status = ").push_bind(payment_status.as_str());
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND b.end_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND b.start_date <= ").push_bind(to);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for amenity bookings.
pub struct BookingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paged booking search. The date range matches bookings that overlap it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &BookingFilter) -> Result<Page<Booking>, RepositoryError> {
        let request = filter.page_request();

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.amenity_bookings b");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let column = sort_column(filter.sort_by.as_deref(), SORT_COLUMNS, "b.created_at");
        let direction = sort_direction(filter.sort_dir.as_deref());

        let mut qb = QueryBuilder::<Postgres>::new(BOOKING_SELECT);
        push_filters(&mut qb, filter);
        qb.push(format!(" ORDER BY {column} {direction}, b.id LIMIT "))
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_SELECT} WHERE b.id = $1 AND NOT b.is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// The first active booking by `user_id` on the amenity that overlaps `range`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn overlapping(
        &self,
        amenity_id: AmenityId,
        user_id: UserId,
        range: DateRange,
        exclude: Option<BookingId>,
    ) -> Result<Option<Booking>, RepositoryError> {
        let active: Vec<&str> = BookingStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{BOOKING_SELECT}
             WHERE NOT b.is_deleted
               AND b.amenity_id = $1
               AND b.user_id = $2
               AND b.status = ANY($3)
               AND b.start_date <= $5
               AND b.end_date >= $4
               AND ($6::uuid IS NULL OR b.id <> $6)
             ORDER BY b.start_date
             LIMIT 1"
        ))
        .bind(amenity_id)
        .bind(user_id)
        .bind(&active)
        .bind(range.start())
        .bind(range.end())
        .bind(exclude)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, booking: &NewBooking) -> Result<Booking, RepositoryError> {
        let id = BookingId::new_v4();
        sqlx::query(
            "INSERT INTO building.amenity_bookings
                (id, amenity_id, package_id, apartment_id, user_id, start_date, end_date,
                 price, total_price, status, payment_status, notes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10, $11, $12)",
        )
        .bind(id)
        .bind(booking.amenity_id)
        .bind(booking.package_id)
        .bind(booking.apartment_id)
        .bind(booking.user_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.price)
        .bind(BookingStatus::Pending.as_str())
        .bind(PaymentStatus::Unpaid.as_str())
        .bind(booking.notes.as_deref())
        .bind(&booking.created_by)
        .execute(self.pool)
        .await?;

        tracing::info!(
            booking_id = %id,
            amenity_id = %booking.amenity_id,
            start = %booking.start_date,
            end = %booking.end_date,
            "Booking created"
        );
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Switch a pending booking to another package.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking does not exist.
    pub async fn update(
        &self,
        id: BookingId,
        package_id: PackageId,
        end_date: NaiveDate,
        price: i32,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<Booking, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenity_bookings
             SET package_id = $2, end_date = $3, price = $4, total_price = $4,
                 notes = COALESCE($5, notes), updated_at = NOW(), updated_by = $6
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(package_id)
        .bind(end_date)
        .bind(price)
        .bind(notes)
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
    /// Returns `RepositoryError::NotFound` if the booking does not exist.
    pub async fn set_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        actor: &str,
    ) -> Result<Booking, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenity_bookings
             SET status = $2, updated_at = NOW(), updated_by = $3
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(actor)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Cancel a booking, recording the reason in its notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking does not exist.
    pub async fn cancel(
        &self,
        id: BookingId,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<Booking, RepositoryError> {
        let note = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("Cancelled: {r}"));
        let result = sqlx::query(
            "UPDATE building.amenity_bookings
             SET status = $2, notes = COALESCE($3, notes), updated_at = NOW(), updated_by = $4
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(BookingStatus::Cancelled.as_str())
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
    /// Returns `RepositoryError::NotFound` if the booking does not exist.
    pub async fn set_payment_status(
        &self,
        id: BookingId,
        payment_status: PaymentStatus,
        actor: &str,
    ) -> Result<Booking, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenity_bookings
             SET payment_status = $2, updated_at = NOW(), updated_by = $3
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(payment_status.as_str())
        .bind(actor)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Complete every confirmed booking whose end date has arrived.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn complete_due(&self, today: NaiveDate) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.amenity_bookings
             SET status = $1, updated_at = NOW(), updated_by = 'system'
             WHERE status = $2 AND end_date <= $3 AND NOT is_deleted",
        )
        .bind(BookingStatus::Completed.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(today)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
