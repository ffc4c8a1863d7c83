//! Door access cards and their audit history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{ApartmentId, CardHistoryId, CardId, CardStatus, UserId};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCard {
    pub id: CardId,
    pub card_number: String,
    pub status: CardStatus,
    pub issued_to_user_id: Option<UserId>,
    pub issued_to_apartment_id: Option<ApartmentId>,
    pub apartment_number: Option<String>,
    pub issued_date: DateTime<Utc>,
    pub expired_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCardInput {
    pub card_number: String,
    #[serde(default)]
    pub status: CardStatus,
    pub issued_to_user_id: Option<UserId>,
    pub issued_to_apartment_id: Option<ApartmentId>,
    pub issued_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCardFilter {
    /// Matches the card number.
    pub q: Option<String>,
    pub status: Option<CardStatus>,
    pub apartment_id: Option<ApartmentId>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for AccessCardFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardHistory {
    pub id: CardHistoryId,
    pub card_id: CardId,
    pub event_code: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: Option<String>,
    pub event_time: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// One history row to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEvent {
    pub event_code: &'static str,
    pub field_name: Option<&'static str>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: String,
}

/// Event codes written to `card_history`.
pub mod events {
    pub const CREATED: &str = "CREATED";
    pub const UPDATED: &str = "UPDATED";
    pub const STATUS_CHANGED: &str = "STATUS_CHANGED";
    pub const DELETED: &str = "DELETED";
}
