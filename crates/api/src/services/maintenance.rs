//! Asset maintenance schedules.
//!
//! A schedule books a window on one asset. While a schedule is IN_PROGRESS
//! the asset and every amenity built on it are in MAINTENANCE status; they
//! return to ACTIVE once no in-progress schedule remains. The background
//! job drives the SCHEDULED -> IN_PROGRESS -> DONE moves from the clock and
//! posts reminder announcements for staff.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::PgPool;

use sams_core::{
    AmenityStatus, AnnouncementStatus, AnnouncementType, AssetId, AssetStatus, Page, PeriodError,
    ScheduleId, ScheduleStatus, TimedRange,
};

use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{AmenityRepository, AnnouncementRepository, AssetRepository, MaintenanceRepository};
use crate::models::announcement::{AnnouncementData, scopes};
use crate::models::asset::{
    Asset, AssetInput, DEFAULT_REMINDER_DAYS, MaintenanceSchedule, ScheduleData, ScheduleFilter,
    ScheduleInput, ScheduleStatusInput,
};
use crate::models::session::CurrentUser;

/// Counts reported by one run of the maintenance job.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceRun {
    pub started: usize,
    pub finished: usize,
    pub reminders: usize,
}

/// Length of the window planned for a newly registered asset, in days
/// after its start.
const FIRST_WINDOW_DAYS: u64 = 3;

/// Where a booking comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleOrigin {
    /// Staff booking through the API.
    Request,
    /// First window planned when an asset is registered.
    AssetRegistration,
}

impl ScheduleOrigin {
    /// Whether the past-date, in-maintenance and overlap rules apply.
    const fn checks_dates(self) -> bool {
        matches!(self, Self::Request)
    }
}

/// Maintenance schedule business rules.
pub struct MaintenanceService<'a> {
    pool: &'a PgPool,
    schedules: MaintenanceRepository<'a>,
    clock: BuildingClock,
}

impl<'a> MaintenanceService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            pool,
            schedules: MaintenanceRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Page<MaintenanceSchedule>, ServiceError> {
        Ok(self.schedules.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the schedule does not exist.
    pub async fn get(&self, id: ScheduleId) -> Result<MaintenanceSchedule, ServiceError> {
        self.schedules
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy lịch bảo trì"))
    }

    /// Book a maintenance window.
    ///
    /// The window may not start in the past, the asset may not be under
    /// maintenance right now, and the window may not collide with another
    /// active schedule of the asset. A window starting within its reminder
    /// period gets a staff reminder immediately.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` describing the first failed rule.
    pub async fn create(
        &self,
        input: &ScheduleInput,
        caller: &CurrentUser,
    ) -> Result<MaintenanceSchedule, ServiceError> {
        self.book(input, Some(caller), ScheduleOrigin::Request).await
    }

    /// Register an asset and plan its first maintenance window.
    ///
    /// With a maintenance cycle, a SCHEDULED window opens one cycle after
    /// the purchase date (or today, whichever is later) and lasts
    /// [`FIRST_WINDOW_DAYS`] more days. Failing to plan it is logged and
    /// does not undo the registration.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the asset cannot be stored,
    /// e.g. for a duplicate code.
    pub async fn create_asset(
        &self,
        input: &AssetInput,
        caller: &CurrentUser,
    ) -> Result<Asset, ServiceError> {
        let asset = AssetRepository::new(self.pool).create(input).await?;
        tracing::info!(asset_id = %asset.id, code = %asset.code, by = %caller.username, "Asset created");

        let Some(frequency) = asset.maintenance_frequency_days else {
            return Ok(asset);
        };
        let Some((start_date, end_date)) =
            first_maintenance_window(asset.purchase_date, self.clock.today(), frequency)
        else {
            return Ok(asset);
        };

        let schedule = ScheduleInput {
            asset_id: asset.id,
            start_date,
            end_date,
            start_time: None,
            end_time: None,
            reminder_days: Some(DEFAULT_REMINDER_DAYS),
            description: Some(format!("Lịch bảo trì tự động - Chu kỳ {frequency} ngày")),
        };
        match self.book(&schedule, None, ScheduleOrigin::AssetRegistration).await {
            Ok(planned) => tracing::info!(
                schedule_id = %planned.id,
                asset_id = %asset.id,
                frequency,
                "Planned first maintenance for new asset"
            ),
            Err(e) => tracing::error!(
                asset_id = %asset.id,
                code = %asset.code,
                error = %e,
                "Failed to plan first maintenance for new asset"
            ),
        }
        Ok(asset)
    }

    async fn book(
        &self,
        input: &ScheduleInput,
        caller: Option<&CurrentUser>,
        origin: ScheduleOrigin,
    ) -> Result<MaintenanceSchedule, ServiceError> {
        let asset = self.asset(input.asset_id).await?;
        let window = schedule_window(input)?;

        if origin.checks_dates() {
            check_not_in_past(&window, self.clock.now_local())?;
            if self
                .schedules
                .is_under_maintenance(asset.id, self.clock.now_local())
                .await?
            {
                return Err(ServiceError::Validation(format!(
                    "Tài sản {} đang trong quá trình bảo trì. Vui lòng chờ hoàn thành hoặc hủy lịch bảo trì hiện tại.",
                    asset.name
                )));
            }
            self.check_overlap(asset.id, &window, None).await?;
        }

        let data = ScheduleData {
            asset_id: asset.id,
            window,
            reminder_days: input.reminder_days.filter(|d| *d > 0).unwrap_or(DEFAULT_REMINDER_DAYS),
            description: non_blank(input.description.as_deref()),
        };
        let schedule = self.schedules.create(&data, caller.map(|c| c.id)).await?;
        tracing::info!(
            schedule_id = %schedule.id,
            asset = %asset.code,
            window = %schedule.describe_window(),
            "Maintenance scheduled"
        );

        if self.reminder_due(&schedule) {
            self.post_reminder(&schedule, &asset).await?;
        }
        Ok(schedule)
    }

    /// Move or re-describe a schedule. Finished schedules are read-only.
    ///
    /// The window is always checked against the asset's other active
    /// schedules. A moved SCHEDULED window may not start in the past.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a DONE schedule and
    /// `ServiceError::Validation` when the new window is invalid or
    /// collides with another schedule.
    pub async fn update(
        &self,
        id: ScheduleId,
        input: &ScheduleInput,
    ) -> Result<MaintenanceSchedule, ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == ScheduleStatus::Done {
            return Err(ServiceError::invalid_state(
                "Không thể sửa lịch bảo trì đã hoàn thành",
            ));
        }

        let asset = self.asset(input.asset_id).await?;
        let window = schedule_window(input)?;
        let moved = existing.window().ok() != Some(window) || existing.asset_id != asset.id;
        if moved && existing.status == ScheduleStatus::Scheduled {
            check_not_in_past(&window, self.clock.now_local())?;
        }
        self.check_overlap(asset.id, &window, Some(id)).await?;

        let data = ScheduleData {
            asset_id: asset.id,
            window,
            reminder_days: input.reminder_days.filter(|d| *d > 0).unwrap_or(existing.reminder_days),
            description: non_blank(input.description.as_deref()),
        };
        let updated = self.schedules.update(id, &data).await?;

        if existing.status == ScheduleStatus::InProgress && existing.asset_id != asset.id {
            self.release_asset(existing.asset_id, id).await?;
            self.hold_asset(asset.id).await?;
        }
        Ok(updated)
    }

    /// Apply a manual status change.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` when the transition table
    /// forbids the move.
    pub async fn change_status(
        &self,
        id: ScheduleId,
        input: &ScheduleStatusInput,
        caller: &CurrentUser,
    ) -> Result<MaintenanceSchedule, ServiceError> {
        let existing = self.get(id).await?;
        existing.status.check_transition(input.status)?;

        let notes = non_blank(input.completion_notes.as_deref());
        let updated = self
            .schedules
            .set_status(id, input.status, self.clock.now(), Some(caller.id), notes.as_deref())
            .await?;
        self.apply_side_effects(&existing, &updated).await?;

        tracing::info!(
            schedule_id = %id,
            from = %existing.status,
            to = %updated.status,
            by = %caller.username,
            "Maintenance status changed"
        );
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for an in-progress schedule.
    pub async fn delete(&self, id: ScheduleId) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == ScheduleStatus::InProgress {
            return Err(ServiceError::invalid_state(
                "Không thể xóa lịch bảo trì đang thực hiện",
            ));
        }
        AnnouncementRepository::new(self.pool)
            .close_for_schedule(id, self.clock.now())
            .await?;
        self.schedules.delete(id).await?;
        Ok(())
    }

    // ===== Job hooks =====

    /// Start every scheduled window that has opened.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if a query fails.
    pub async fn start_due(&self) -> Result<usize, ServiceError> {
        let due = self.schedules.due_to_start(self.clock.now_local()).await?;
        let mut started = 0;
        for schedule in due {
            let updated = self
                .schedules
                .set_status(schedule.id, ScheduleStatus::InProgress, self.clock.now(), None, None)
                .await?;
            self.apply_side_effects(&schedule, &updated).await?;
            tracing::info!(schedule_id = %schedule.id, asset_id = %schedule.asset_id, "Maintenance started");
            started += 1;
        }
        Ok(started)
    }

    /// Finish every in-progress window that has closed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if a query fails.
    pub async fn finish_due(&self) -> Result<usize, ServiceError> {
        let due = self.schedules.due_to_finish(self.clock.now_local()).await?;
        let mut finished = 0;
        for schedule in due {
            let updated = self
                .schedules
                .set_status(
                    schedule.id,
                    ScheduleStatus::Done,
                    self.clock.now(),
                    None,
                    Some("Tự động hoàn thành khi hết thời gian bảo trì"),
                )
                .await?;
            self.apply_side_effects(&schedule, &updated).await?;
            tracing::info!(schedule_id = %schedule.id, asset_id = %schedule.asset_id, "Maintenance finished");
            finished += 1;
        }
        Ok(finished)
    }

    /// Post reminders for schedules entering their reminder period.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if a query fails.
    pub async fn send_reminders(&self) -> Result<usize, ServiceError> {
        let due = self.schedules.due_for_reminder(self.clock.today()).await?;
        let assets = AssetRepository::new(self.pool);
        let mut sent = 0;
        for schedule in due {
            let Some(asset) = assets.get(schedule.asset_id).await? else {
                continue;
            };
            self.post_reminder(&schedule, &asset).await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// One pass of every clock-driven hook.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure.
    pub async fn run_due(&self) -> Result<MaintenanceRun, ServiceError> {
        Ok(MaintenanceRun {
            started: self.start_due().await?,
            finished: self.finish_due().await?,
            reminders: self.send_reminders().await?,
        })
    }

    // ===== Internals =====

    async fn asset(&self, id: AssetId) -> Result<Asset, ServiceError> {
        AssetRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::Validation(format!("Tài sản {id} không tồn tại")))
    }

    async fn check_overlap(
        &self,
        asset_id: AssetId,
        window: &TimedRange,
        exclude: Option<ScheduleId>,
    ) -> Result<(), ServiceError> {
        if let Some(conflict) = self.schedules.overlapping(asset_id, window, exclude).await? {
            return Err(ServiceError::Validation(format!(
                "Lịch bảo trì trùng với lịch đã có: {}",
                conflict.describe_window()
            )));
        }
        Ok(())
    }

    /// Asset and amenity status follow the schedule's move.
    async fn apply_side_effects(
        &self,
        before: &MaintenanceSchedule,
        after: &MaintenanceSchedule,
    ) -> Result<(), ServiceError> {
        match (before.status, after.status) {
            (ScheduleStatus::InProgress, ScheduleStatus::InProgress) => {}
            (_, ScheduleStatus::InProgress) => self.hold_asset(after.asset_id).await?,
            (ScheduleStatus::InProgress, _) => self.release_asset(after.asset_id, after.id).await?,
            _ => {}
        }
        if matches!(after.status, ScheduleStatus::Done | ScheduleStatus::Cancelled) {
            AnnouncementRepository::new(self.pool)
                .close_for_schedule(after.id, self.clock.now())
                .await?;
        }
        Ok(())
    }

    async fn hold_asset(&self, asset_id: AssetId) -> Result<(), ServiceError> {
        AssetRepository::new(self.pool)
            .set_status(asset_id, AssetStatus::Maintenance)
            .await?;
        AmenityRepository::new(self.pool)
            .set_status_for_asset(asset_id, AmenityStatus::Maintenance)
            .await?;
        Ok(())
    }

    async fn release_asset(&self, asset_id: AssetId, finished: ScheduleId) -> Result<(), ServiceError> {
        if self.schedules.has_other_in_progress(asset_id, finished).await? {
            return Ok(());
        }
        AssetRepository::new(self.pool)
            .set_status(asset_id, AssetStatus::Active)
            .await?;
        AmenityRepository::new(self.pool)
            .set_status_for_asset(asset_id, AmenityStatus::Active)
            .await?;
        Ok(())
    }

    fn reminder_due(&self, schedule: &MaintenanceSchedule) -> bool {
        let today = self.clock.today();
        schedule.status == ScheduleStatus::Scheduled
            && schedule.start_date >= today
            && schedule.start_date <= today + chrono::Days::new(u64::from(schedule.reminder_days))
    }

    async fn post_reminder(
        &self,
        schedule: &MaintenanceSchedule,
        asset: &Asset,
    ) -> Result<(), ServiceError> {
        let visible_to = self
            .clock
            .to_utc(schedule.end_date.and_time(end_of_day()));
        let data = AnnouncementData {
            title: format!("Nhắc nhở bảo trì tài sản: {}", asset.name),
            content: reminder_content(schedule, asset),
            visible_from: self.clock.now(),
            visible_to: Some(visible_to),
            visibility_scope: scopes::STAFF.to_owned(),
            status: AnnouncementStatus::Active,
            is_pinned: false,
            announcement_type: AnnouncementType::MaintenanceReminder,
            schedule_id: Some(schedule.id),
            booking_id: None,
        };
        AnnouncementRepository::new(self.pool)
            .create(&data, "system")
            .await?;
        tracing::info!(schedule_id = %schedule.id, asset = %asset.code, "Maintenance reminder posted");
        Ok(())
    }
}

/// Dates of the first window for an asset with a maintenance cycle of
/// `frequency_days`. `None` for a non-positive cycle.
fn first_maintenance_window(
    purchase_date: Option<NaiveDate>,
    today: NaiveDate,
    frequency_days: i32,
) -> Option<(NaiveDate, NaiveDate)> {
    let frequency = u64::try_from(frequency_days).ok().filter(|f| *f > 0)?;
    let base = purchase_date.map_or(today, |p| p.max(today));
    let start = base.checked_add_days(Days::new(frequency))?;
    let end = start.checked_add_days(Days::new(FIRST_WINDOW_DAYS))?;
    Some((start, end))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Validate the requested window, with user-facing messages.
fn schedule_window(input: &ScheduleInput) -> Result<TimedRange, ServiceError> {
    TimedRange::new(input.start_date, input.end_date, input.start_time, input.end_time).map_err(
        |e| {
            let message = match e {
                PeriodError::EndBeforeStart => "Ngày kết thúc phải lớn hơn hoặc bằng ngày bắt đầu",
                PeriodError::UnpairedTime => "Giờ bắt đầu và giờ kết thúc phải đi cùng nhau",
                PeriodError::EndTimeNotAfterStart => {
                    "Khi cùng ngày, giờ kết thúc phải sau giờ bắt đầu"
                }
                PeriodError::InvalidMonth { .. } => "Khoảng thời gian không hợp lệ",
            };
            ServiceError::validation(message)
        },
    )
}

fn check_not_in_past(window: &TimedRange, now: NaiveDateTime) -> Result<(), ServiceError> {
    let today = now.date();
    if window.start_date < today {
        return Err(ServiceError::validation("Ngày bắt đầu không được trong quá khứ"));
    }
    if window.start_date == today && window.start_time.is_some_and(|st| st < now.time()) {
        return Err(ServiceError::Validation(format!(
            "Giờ bắt đầu không được trong quá khứ. Giờ hiện tại: {}",
            now.format("%H:%M")
        )));
    }
    Ok(())
}

fn reminder_content(schedule: &MaintenanceSchedule, asset: &Asset) -> String {
    let mut content = format!(
        "Tài sản {} - {} sẽ bắt đầu bảo trì vào ngày {}. Lịch bảo trì kết thúc vào ngày {}.",
        asset.code,
        asset.name,
        schedule.start_date.format("%d/%m/%Y"),
        schedule.end_date.format("%d/%m/%Y"),
    );
    if let Some(description) = schedule.description.as_deref() {
        content.push_str(" Mô tả: ");
        content.push_str(description);
    }
    content
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn input(start: NaiveDate, end: NaiveDate, times: Option<(NaiveTime, NaiveTime)>) -> ScheduleInput {
        ScheduleInput {
            asset_id: AssetId::new_v4(),
            start_date: start,
            end_date: end,
            start_time: times.map(|(s, _)| s),
            end_time: times.map(|(_, e)| e),
            reminder_days: None,
            description: None,
        }
    }

    #[test]
    fn test_schedule_window_messages() {
        let err = schedule_window(&input(d(2025, 3, 2), d(2025, 3, 1), None)).unwrap_err();
        assert_eq!(err.to_string(), "Ngày kết thúc phải lớn hơn hoặc bằng ngày bắt đầu");

        let mut unpaired = input(d(2025, 3, 1), d(2025, 3, 1), None);
        unpaired.start_time = Some(t(8, 0));
        assert!(matches!(schedule_window(&unpaired), Err(ServiceError::Validation(_))));

        let same_day = input(d(2025, 3, 1), d(2025, 3, 1), Some((t(10, 0), t(9, 0))));
        assert_eq!(
            schedule_window(&same_day).unwrap_err().to_string(),
            "Khi cùng ngày, giờ kết thúc phải sau giờ bắt đầu"
        );

        assert!(schedule_window(&input(d(2025, 3, 1), d(2025, 3, 2), Some((t(22, 0), t(6, 0))))).is_ok());
    }

    #[test]
    fn test_check_not_in_past() {
        let now = d(2025, 3, 10).and_time(t(9, 30));

        let yesterday = TimedRange::new(d(2025, 3, 9), d(2025, 3, 12), None, None).unwrap();
        assert!(check_not_in_past(&yesterday, now).is_err());

        let today_all_day = TimedRange::new(d(2025, 3, 10), d(2025, 3, 10), None, None).unwrap();
        assert!(check_not_in_past(&today_all_day, now).is_ok());

        let earlier_today =
            TimedRange::new(d(2025, 3, 10), d(2025, 3, 10), Some(t(8, 0)), Some(t(11, 0))).unwrap();
        assert_eq!(
            check_not_in_past(&earlier_today, now).unwrap_err().to_string(),
            "Giờ bắt đầu không được trong quá khứ. Giờ hiện tại: 09:30"
        );

        let later_today =
            TimedRange::new(d(2025, 3, 10), d(2025, 3, 10), Some(t(10, 0)), Some(t(11, 0))).unwrap();
        assert!(check_not_in_past(&later_today, now).is_ok());
    }

    #[test]
    fn test_only_api_bookings_check_dates() {
        assert!(ScheduleOrigin::Request.checks_dates());
        assert!(!ScheduleOrigin::AssetRegistration.checks_dates());
    }

    #[test]
    fn test_client_cannot_skip_date_checks() {
        let input: ScheduleInput = serde_json::from_value(serde_json::json!({
            "assetId": AssetId::new_v4(),
            "startDate": "2020-01-01",
            "endDate": "2020-01-02",
            "skipDateValidation": true,
        }))
        .unwrap();
        let now = d(2025, 3, 10).and_time(t(9, 0));
        assert!(check_not_in_past(&schedule_window(&input).unwrap(), now).is_err());
    }

    #[test]
    fn test_first_maintenance_window() {
        let today = d(2025, 3, 10);

        // Purchased long ago: counted from today
        assert_eq!(
            first_maintenance_window(Some(d(2023, 1, 10)), today, 90),
            Some((d(2025, 6, 8), d(2025, 6, 11)))
        );
        // Delivery still ahead: counted from the purchase date
        assert_eq!(
            first_maintenance_window(Some(d(2025, 4, 1)), today, 30),
            Some((d(2025, 5, 1), d(2025, 5, 4)))
        );
        assert_eq!(
            first_maintenance_window(None, today, 7),
            Some((d(2025, 3, 17), d(2025, 3, 20)))
        );
        assert_eq!(first_maintenance_window(None, today, 0), None);
        assert_eq!(first_maintenance_window(None, today, -5), None);
    }

    #[test]
    fn test_reminder_content() {
        let asset = Asset {
            id: AssetId::new_v4(),
            code: "ELV-01".to_string(),
            name: "Thang máy A".to_string(),
            apartment_id: None,
            location: None,
            purchase_date: None,
            warranty_expire: None,
            maintenance_frequency_days: None,
            status: AssetStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };
        let schedule = MaintenanceSchedule {
            id: ScheduleId::new_v4(),
            asset_id: asset.id,
            asset_code: None,
            asset_name: None,
            start_date: d(2025, 3, 12),
            end_date: d(2025, 3, 13),
            start_time: None,
            end_time: None,
            reminder_days: 3,
            description: Some("Thay cáp".to_string()),
            status: ScheduleStatus::Scheduled,
            created_by: None,
            created_at: Utc::now(),
            actual_start_at: None,
            actual_end_at: None,
            completion_notes: None,
            completed_by: None,
            completed_at: None,
        };
        assert_eq!(
            reminder_content(&schedule, &asset),
            "Tài sản ELV-01 - Thang máy A sẽ bắt đầu bảo trì vào ngày 12/03/2025. \
             Lịch bảo trì kết thúc vào ngày 13/03/2025. Mô tả: Thay cáp"
        );
    }
}
