//! Asset maintenance schedule repository.
//!
//! Window overlap and "in progress" checks are evaluated with
//! [`TimedRange`] after loading the asset's active schedules, since windows
//! may or may not carry times of day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{AnnouncementType, AssetId, Page, ScheduleId, ScheduleStatus, TimedRange, UserId};

use super::{RepositoryError, parse_column};
use crate::models::Paged;
use crate::models::asset::{MaintenanceSchedule, ScheduleData, ScheduleFilter};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: ScheduleId,
    asset_id: AssetId,
    asset_code: Option<String>,
    asset_name: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    reminder_days: i32,
    description: Option<String>,
    status: String,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    actual_start_at: Option<DateTime<Utc>>,
    actual_end_at: Option<DateTime<Utc>>,
    completion_notes: Option<String>,
    completed_by: Option<UserId>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScheduleRow> for MaintenanceSchedule {
    type Error = RepositoryError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let reminder_days = u32::try_from(row.reminder_days).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative reminder_days: {}", row.reminder_days))
        })?;
        Ok(Self {
            id: row.id,
            asset_id: row.asset_id,
            asset_code: row.asset_code,
            asset_name: row.asset_name,
            start_date: row.start_date,
            end_date: row.end_date,
            start_time: row.start_time,
            end_time: row.end_time,
            reminder_days,
            description: row.description,
            status: parse_column::<ScheduleStatus>(&row.status, "status")?,
            created_by: row.created_by,
            created_at: row.created_at,
            actual_start_at: row.actual_start_at,
            actual_end_at: row.actual_end_at,
            completion_notes: row.completion_notes,
            completed_by: row.completed_by,
            completed_at: row.completed_at,
        })
    }
}

const SCHEDULE_SELECT: &str = "
    SELECT s.id, s.asset_id, a.code AS asset_code, a.name AS asset_name, s.start_date,
           s.end_date, s.start_time, s.end_time, s.reminder_days, s.description, s.status,
           s.created_by, s.created_at, s.actual_start_at, s.actual_end_at,
           s.completion_notes, s.completed_by, s.completed_at
    FROM building.asset_maintenance_schedules s
    LEFT JOIN building.assets a ON a.id = s.asset_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ScheduleFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (a.code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(asset_id) = filter.asset_id {
        qb.push(" AND s.asset_id = ").push_bind(asset_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.start_from {
        qb.push(" AND s.start_date >= ").push_bind(from);
    }
    if let Some(to) = filter.start_to {
        qb.push(" AND s.start_date <= ").push_bind(to);
    }
}

fn active_statuses() -> Vec<&'static str> {
    ScheduleStatus::ACTIVE.iter().map(|s| s.as_str()).collect()
}

fn reminder_days_db(days: u32) -> i32 {
    i32::try_from(days).unwrap_or(i32::MAX)
}

fn collect(rows: Vec<ScheduleRow>) -> Result<Vec<MaintenanceSchedule>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for maintenance schedules.
pub struct MaintenanceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MaintenanceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Page<MaintenanceSchedule>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM building.asset_maintenance_schedules s
             LEFT JOIN building.assets a ON a.id = s.asset_id",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(SCHEDULE_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY s.start_date DESC, s.start_time DESC NULLS LAST LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<ScheduleRow> = qb.build_query_as().fetch_all(self.pool).await?;

        Ok(Page::new(collect(rows)?, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ScheduleId) -> Result<Option<MaintenanceSchedule>, RepositoryError> {
        let row = sqlx::query_as::<_, ScheduleRow>(&format!("{SCHEDULE_SELECT} WHERE s.id = $1"))
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
        data: &ScheduleData,
        created_by: Option<UserId>,
    ) -> Result<MaintenanceSchedule, RepositoryError> {
        let id = ScheduleId::new_v4();
        sqlx::query(
            "INSERT INTO building.asset_maintenance_schedules
                (id, asset_id, start_date, end_date, start_time, end_time, reminder_days,
                 description, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(data.asset_id)
        .bind(data.window.start_date)
        .bind(data.window.end_date)
        .bind(data.window.start_time)
        .bind(data.window.end_time)
        .bind(reminder_days_db(data.reminder_days))
        .bind(data.description.as_deref())
        .bind(ScheduleStatus::Scheduled.as_str())
        .bind(created_by)
        .execute(self.pool)
        .await?;

        tracing::info!(schedule_id = %id, asset_id = %data.asset_id, "Maintenance scheduled");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist.
    pub async fn update(
        &self,
        id: ScheduleId,
        data: &ScheduleData,
    ) -> Result<MaintenanceSchedule, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.asset_maintenance_schedules
             SET asset_id = $2, start_date = $3, end_date = $4, start_time = $5,
                 end_time = $6, reminder_days = $7, description = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(data.asset_id)
        .bind(data.window.start_date)
        .bind(data.window.end_date)
        .bind(data.window.start_time)
        .bind(data.window.end_time)
        .bind(reminder_days_db(data.reminder_days))
        .bind(data.description.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist.
    pub async fn delete(&self, id: ScheduleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM building.asset_maintenance_schedules WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a status change, stamping the actual start/end and completion
    /// fields that belong to the new status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist.
    pub async fn set_status(
        &self,
        id: ScheduleId,
        status: ScheduleStatus,
        now: DateTime<Utc>,
        actor: Option<UserId>,
        completion_notes: Option<&str>,
    ) -> Result<MaintenanceSchedule, RepositoryError> {
        let started = matches!(status, ScheduleStatus::InProgress);
        let done = matches!(status, ScheduleStatus::Done);
        let result = sqlx::query(
            "UPDATE building.asset_maintenance_schedules
             SET status = $2,
                 actual_start_at = CASE WHEN $3 THEN COALESCE(actual_start_at, $5) ELSE actual_start_at END,
                 actual_end_at = CASE WHEN $4 THEN $5 ELSE actual_end_at END,
                 completed_at = CASE WHEN $4 THEN $5 ELSE completed_at END,
                 completed_by = CASE WHEN $4 THEN $6 ELSE completed_by END,
                 completion_notes = CASE WHEN $4 THEN COALESCE($7, completion_notes) ELSE completion_notes END
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(started)
        .bind(done)
        .bind(now)
        .bind(actor)
        .bind(completion_notes)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Active schedules of one asset.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_for_asset(
        &self,
        asset_id: AssetId,
    ) -> Result<Vec<MaintenanceSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "{SCHEDULE_SELECT} WHERE s.asset_id = $1 AND s.status = ANY($2)
             ORDER BY s.start_date, s.start_time NULLS FIRST"
        ))
        .bind(asset_id)
        .bind(active_statuses())
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// The first active schedule of the asset whose window collides with
    /// `window`, ignoring `exclude`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn overlapping(
        &self,
        asset_id: AssetId,
        window: &TimedRange,
        exclude: Option<ScheduleId>,
    ) -> Result<Option<MaintenanceSchedule>, RepositoryError> {
        let schedules = self.active_for_asset(asset_id).await?;
        Ok(schedules.into_iter().find(|s| {
            Some(s.id) != exclude && s.window().is_ok_and(|w| w.overlaps(window))
        }))
    }

    /// Whether the asset is being maintained at `now` (building local time):
    /// a schedule is IN_PROGRESS, or an active window contains `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_under_maintenance(
        &self,
        asset_id: AssetId,
        now: NaiveDateTime,
    ) -> Result<bool, RepositoryError> {
        let schedules = self.active_for_asset(asset_id).await?;
        Ok(schedules.iter().any(|s| {
            s.status == ScheduleStatus::InProgress
                || s.window().is_ok_and(|w| w.is_active_at(now))
        }))
    }

    /// Scheduled windows that have started by `now` (building local time).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_to_start(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<MaintenanceSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "{SCHEDULE_SELECT} WHERE s.status = $1 AND s.start_date <= $2 ORDER BY s.start_date"
        ))
        .bind(ScheduleStatus::Scheduled.as_str())
        .bind(now.date())
        .fetch_all(self.pool)
        .await?;
        Ok(collect(rows)?
            .into_iter()
            .filter(|s| s.window().is_ok_and(|w| w.has_started(now)))
            .collect())
    }

    /// In-progress windows that ended before `now` (building local time).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_to_finish(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<MaintenanceSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "{SCHEDULE_SELECT} WHERE s.status = $1 AND s.end_date <= $2 ORDER BY s.end_date"
        ))
        .bind(ScheduleStatus::InProgress.as_str())
        .bind(now.date())
        .fetch_all(self.pool)
        .await?;
        Ok(collect(rows)?
            .into_iter()
            .filter(|s| s.window().is_ok_and(|w| w.has_ended(now)))
            .collect())
    }

    /// Scheduled windows starting within their reminder period that have no
    /// reminder announcement yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_for_reminder(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<MaintenanceSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "{SCHEDULE_SELECT}
             WHERE s.status = $1
               AND s.start_date >= $2
               AND s.start_date <= $2 + s.reminder_days
               AND NOT EXISTS (
                   SELECT 1 FROM building.announcements n
                   WHERE n.schedule_id = s.id AND n.announcement_type = $3)
             ORDER BY s.start_date"
        ))
        .bind(ScheduleStatus::Scheduled.as_str())
        .bind(today)
        .bind(AnnouncementType::MaintenanceReminder.as_str())
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Whether any other schedule of the asset is still in progress.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_other_in_progress(
        &self,
        asset_id: AssetId,
        exclude: ScheduleId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM building.asset_maintenance_schedules
                 WHERE asset_id = $1 AND status = $2 AND id <> $3)",
        )
        .bind(asset_id)
        .bind(ScheduleStatus::InProgress.as_str())
        .bind(exclude)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }
}
