//! Building assets and their maintenance schedules.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{
    ApartmentId, AssetId, AssetStatus, PeriodError, ScheduleId, ScheduleStatus, TimedRange,
    UserId,
};

use super::Paged;

/// Reminder lead time used when a schedule gives none.
pub const DEFAULT_REMINDER_DAYS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub code: String,
    pub name: String,
    pub apartment_id: Option<ApartmentId>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expire: Option<NaiveDate>,
    pub maintenance_frequency_days: Option<i32>,
    pub status: AssetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInput {
    pub code: String,
    pub name: String,
    pub apartment_id: Option<ApartmentId>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expire: Option<NaiveDate>,
    pub maintenance_frequency_days: Option<i32>,
    #[serde(default)]
    pub status: AssetStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilter {
    /// Matches code, name or location.
    pub q: Option<String>,
    pub status: Option<AssetStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for AssetFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSchedule {
    pub id: ScheduleId,
    pub asset_id: AssetId,
    pub asset_code: Option<String>,
    pub asset_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reminder_days: u32,
    pub description: Option<String>,
    pub status: ScheduleStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub actual_start_at: Option<DateTime<Utc>>,
    pub actual_end_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub completed_by: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MaintenanceSchedule {
    /// The booked maintenance window.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if the stored window is inconsistent.
    pub fn window(&self) -> Result<TimedRange, PeriodError> {
        TimedRange::new(self.start_date, self.end_date, self.start_time, self.end_time)
    }

    /// `HH:mm dd/MM/yyyy - HH:mm dd/MM/yyyy`, times omitted when absent.
    #[must_use]
    pub fn describe_window(&self) -> String {
        let part = |date: NaiveDate, time: Option<NaiveTime>| match time {
            Some(t) => format!("{} {}", t.format("%H:%M"), date.format("%d/%m/%Y")),
            None => date.format("%d/%m/%Y").to_string(),
        };
        format!(
            "{} - {}",
            part(self.start_date, self.start_time),
            part(self.end_date, self.end_time)
        )
    }
}

/// A validated schedule window and its metadata.
#[derive(Debug, Clone)]
pub struct ScheduleData {
    pub asset_id: AssetId,
    pub window: TimedRange,
    pub reminder_days: u32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub asset_id: AssetId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reminder_days: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatusInput {
    pub status: ScheduleStatus,
    pub completion_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    /// Matches description, asset code or asset name.
    pub q: Option<String>,
    pub asset_id: Option<AssetId>,
    pub status: Option<ScheduleStatus>,
    pub start_from: Option<NaiveDate>,
    pub start_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for ScheduleFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}
