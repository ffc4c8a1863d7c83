//! Announcement repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{AnnouncementId, AnnouncementStatus, AnnouncementType, BookingId, Page, ScheduleId};

use super::{RepositoryError, parse_column};
use crate::models::Paged;
use crate::models::announcement::{Announcement, AnnouncementData, AnnouncementFilter, scopes};

#[derive(Debug, sqlx::FromRow)]
struct AnnouncementRow {
    id: AnnouncementId,
    title: String,
    content: String,
    visible_from: DateTime<Utc>,
    visible_to: Option<DateTime<Utc>>,
    visibility_scope: String,
    status: String,
    is_pinned: bool,
    announcement_type: String,
    schedule_id: Option<ScheduleId>,
    booking_id: Option<BookingId>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<AnnouncementRow> for Announcement {
    type Error = RepositoryError;

    fn try_from(row: AnnouncementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            visible_from: row.visible_from,
            visible_to: row.visible_to,
            visibility_scope: row.visibility_scope,
            status: parse_column::<AnnouncementStatus>(&row.status, "status")?,
            is_pinned: row.is_pinned,
            announcement_type: parse_column::<AnnouncementType>(
                &row.announcement_type,
                "announcement_type",
            )?,
            schedule_id: row.schedule_id,
            booking_id: row.booking_id,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

const COLUMNS: &str = "id, title, content, visible_from, visible_to, visibility_scope, status, \
    is_pinned, announcement_type, schedule_id, booking_id, created_at, created_by, updated_at, \
    updated_by";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AnnouncementFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.announcement_type {
        qb.push(" AND announcement_type = ").push_bind(kind.as_str());
    }
    if let Some(scope) = filter.visibility_scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND visibility_scope = ").push_bind(scope.to_uppercase());
    }
}

/// Repository for announcements.
pub struct AnnouncementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnnouncementRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &AnnouncementFilter,
    ) -> Result<Page<Announcement>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.announcements");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM building.announcements"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY is_pinned DESC, visible_from DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<AnnouncementRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// Announcements currently visible to `scope` (plus those addressed to all).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active(
        &self,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Announcement>, RepositoryError> {
        let rows = sqlx::query_as::<_, AnnouncementRow>(&format!(
            "SELECT {COLUMNS} FROM building.announcements
             WHERE status = $1
               AND visible_from <= $2
               AND (visible_to IS NULL OR visible_to >= $2)
               AND visibility_scope IN ($3, $4)
             ORDER BY is_pinned DESC, visible_from DESC"
        ))
        .bind(AnnouncementStatus::Active.as_str())
        .bind(now)
        .bind(scopes::ALL)
        .bind(scope)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AnnouncementId) -> Result<Option<Announcement>, RepositoryError> {
        let row = sqlx::query_as::<_, AnnouncementRow>(&format!(
            "SELECT {COLUMNS} FROM building.announcements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        data: &AnnouncementData,
        actor: &str,
    ) -> Result<Announcement, RepositoryError> {
        let row = sqlx::query_as::<_, AnnouncementRow>(&format!(
            "INSERT INTO building.announcements
                (id, title, content, visible_from, visible_to, visibility_scope, status,
                 is_pinned, announcement_type, schedule_id, booking_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {COLUMNS}"
        ))
        .bind(AnnouncementId::new_v4())
        .bind(&data.title)
        .bind(&data.content)
        .bind(data.visible_from)
        .bind(data.visible_to)
        .bind(&data.visibility_scope)
        .bind(data.status.as_str())
        .bind(data.is_pinned)
        .bind(data.announcement_type.as_str())
        .bind(data.schedule_id)
        .bind(data.booking_id)
        .bind(actor)
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the announcement does not exist.
    pub async fn update(
        &self,
        id: AnnouncementId,
        data: &AnnouncementData,
        actor: &str,
    ) -> Result<Announcement, RepositoryError> {
        let row = sqlx::query_as::<_, AnnouncementRow>(&format!(
            "UPDATE building.announcements
             SET title = $2, content = $3, visible_from = $4, visible_to = $5,
                 visibility_scope = $6, status = $7, is_pinned = $8, announcement_type = $9,
                 updated_at = NOW(), updated_by = $10
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(data.visible_from)
        .bind(data.visible_to)
        .bind(&data.visibility_scope)
        .bind(data.status.as_str())
        .bind(data.is_pinned)
        .bind(data.announcement_type.as_str())
        .bind(actor)
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the announcement does not exist.
    pub async fn delete(&self, id: AnnouncementId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.announcements WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Expire active announcements whose window has closed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.announcements
             SET status = $1, updated_at = $3, updated_by = 'system'
             WHERE status = $2 AND visible_to IS NOT NULL AND visible_to < $3",
        )
        .bind(AnnouncementStatus::Expired.as_str())
        .bind(AnnouncementStatus::Active.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Activate scheduled announcements whose window has opened.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn activate_due(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.announcements
             SET status = $1, updated_at = $3, updated_by = 'system'
             WHERE status = $2 AND visible_from <= $3
               AND (visible_to IS NULL OR visible_to >= $3)",
        )
        .bind(AnnouncementStatus::Active.as_str())
        .bind(AnnouncementStatus::Scheduled.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Hide the reminders of a finished maintenance schedule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn close_for_schedule(
        &self,
        schedule_id: ScheduleId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.announcements
             SET status = $2, visible_to = GREATEST($3, visible_from),
                 updated_at = $3, updated_by = 'system'
             WHERE schedule_id = $1 AND status IN ($4, $5)",
        )
        .bind(schedule_id)
        .bind(AnnouncementStatus::Inactive.as_str())
        .bind(now)
        .bind(AnnouncementStatus::Active.as_str())
        .bind(AnnouncementStatus::Scheduled.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
