//! Announcements shown on the resident and staff dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{AnnouncementId, AnnouncementStatus, AnnouncementType, BookingId, ScheduleId};

use super::Paged;

/// Audience values for `visibility_scope`.
pub mod scopes {
    pub const ALL: &str = "ALL";
    pub const RESIDENTS: &str = "RESIDENTS";
    pub const STAFF: &str = "STAFF";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub content: String,
    pub visible_from: DateTime<Utc>,
    pub visible_to: Option<DateTime<Utc>>,
    pub visibility_scope: String,
    pub status: AnnouncementStatus,
    pub is_pinned: bool,
    pub announcement_type: AnnouncementType,
    pub schedule_id: Option<ScheduleId>,
    pub booking_id: Option<BookingId>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

/// A validated announcement ready to insert or store.
#[derive(Debug, Clone)]
pub struct AnnouncementData {
    pub title: String,
    pub content: String,
    pub visible_from: DateTime<Utc>,
    pub visible_to: Option<DateTime<Utc>>,
    pub visibility_scope: String,
    pub status: AnnouncementStatus,
    pub is_pinned: bool,
    pub announcement_type: AnnouncementType,
    pub schedule_id: Option<ScheduleId>,
    pub booking_id: Option<BookingId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    pub visible_from: Option<DateTime<Utc>>,
    pub visible_to: Option<DateTime<Utc>>,
    pub visibility_scope: Option<String>,
    /// Only honoured for `INACTIVE`; other statuses are derived.
    pub status: Option<AnnouncementStatus>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default, rename = "type")]
    pub announcement_type: AnnouncementType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementFilter {
    /// Matches title or content.
    pub q: Option<String>,
    pub status: Option<AnnouncementStatus>,
    #[serde(rename = "type")]
    pub announcement_type: Option<AnnouncementType>,
    pub visibility_scope: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for AnnouncementFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}
