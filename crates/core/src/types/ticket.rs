//! Service ticket rules: priority SLA, categories, scope and text limits.

use chrono::{DateTime, Duration, TimeZone};

use super::status::{StatusError, wire_enum};

/// Validation failures for ticket input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("subject must be between {min} and {max} characters")]
    SubjectLength { min: usize, max: usize },
    #[error("description must be at most {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("comment must be between 1 and {max} characters")]
    CommentLength { max: usize },
    #[error("an apartment is required when scope is \"Theo căn hộ\"")]
    ApartmentRequired,
    #[error("expected completion must be at least {minutes} minutes from now")]
    CompletionTooSoon { minutes: i64 },
    #[error(transparent)]
    Invalid(#[from] StatusError),
}

pub const SUBJECT_MIN: usize = 3;
pub const SUBJECT_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 4000;
pub const COMMENT_MAX: usize = 4000;

/// Minimum lead time for a manually chosen completion date.
pub const COMPLETION_LEAD_MINUTES: i64 = 30;

wire_enum! {
    /// Ticket priority. Each level carries a completion SLA in days.
    #[derive(Default)]
    pub enum TicketPriority ("priority") {
        Low => "Thấp",
        #[default]
        Normal => "Bình thường",
        Urgent => "Khẩn cấp",
    }
}

impl TicketPriority {
    #[must_use]
    pub const fn sla_days(self) -> i64 {
        match self {
            Self::Low => 5,
            Self::Normal => 3,
            Self::Urgent => 1,
        }
    }

    /// Default expected completion for a ticket created at `created_at`.
    #[must_use]
    pub fn expected_completion<Tz: TimeZone>(self, created_at: DateTime<Tz>) -> DateTime<Tz> {
        created_at + Duration::days(self.sla_days())
    }
}

wire_enum! {
    pub enum TicketCategory ("category") {
        Maintenance => "Bảo trì",
        Security => "An ninh",
        Billing => "Hóa đơn",
        Complaint => "Khiếu nại",
        Cleaning => "Vệ sinh",
        Parking => "Bãi đỗ xe",
        Amenity => "Tiện ích",
        Other => "Khác",
    }
}

wire_enum! {
    /// Whether a ticket concerns the whole building or one apartment.
    #[derive(Default)]
    pub enum TicketScope ("scope") {
        #[default]
        Building => "Tòa nhà",
        Apartment => "Theo căn hộ",
    }
}

impl TicketScope {
    /// Resolve the apartment link for this scope.
    ///
    /// Building-wide tickets drop any apartment; apartment tickets must
    /// carry one.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::ApartmentRequired`] for an apartment-scoped
    /// ticket without an apartment.
    pub fn resolve_apartment<T>(self, apartment: Option<T>) -> Result<Option<T>, TicketError> {
        match (self, apartment) {
            (Self::Building, _) => Ok(None),
            (Self::Apartment, Some(id)) => Ok(Some(id)),
            (Self::Apartment, None) => Err(TicketError::ApartmentRequired),
        }
    }
}

/// Trim and length-check a subject.
///
/// # Errors
///
/// Returns [`TicketError::SubjectLength`] outside 3..=255 characters.
pub fn validate_subject(subject: &str) -> Result<String, TicketError> {
    let trimmed = subject.trim();
    let len = trimmed.chars().count();
    if !(SUBJECT_MIN..=SUBJECT_MAX).contains(&len) {
        return Err(TicketError::SubjectLength {
            min: SUBJECT_MIN,
            max: SUBJECT_MAX,
        });
    }
    Ok(trimmed.to_owned())
}

/// Trim a description, mapping blank input to `None`.
///
/// # Errors
///
/// Returns [`TicketError::DescriptionTooLong`] above 4000 characters.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, TicketError> {
    let Some(text) = description.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > DESCRIPTION_MAX {
        return Err(TicketError::DescriptionTooLong {
            max: DESCRIPTION_MAX,
        });
    }
    Ok(Some(text.to_owned()))
}

/// # Errors
///
/// Returns [`TicketError::CommentLength`] for empty or oversized content.
pub fn validate_comment(content: &str) -> Result<String, TicketError> {
    let trimmed = content.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > COMMENT_MAX {
        return Err(TicketError::CommentLength { max: COMMENT_MAX });
    }
    Ok(trimmed.to_owned())
}

/// Check a manually chosen completion date against `now`.
///
/// # Errors
///
/// Returns [`TicketError::CompletionTooSoon`] when `expected` is less than
/// 30 minutes ahead of `now`.
pub fn validate_expected_completion<Tz: TimeZone>(
    expected: &DateTime<Tz>,
    now: &DateTime<Tz>,
) -> Result<(), TicketError> {
    if *expected < now.clone() + Duration::minutes(COMPLETION_LEAD_MINUTES) {
        return Err(TicketError::CompletionTooSoon {
            minutes: COMPLETION_LEAD_MINUTES,
        });
    }
    Ok(())
}

/// System comment recorded when a ticket changes status.
#[must_use]
pub fn status_change_comment(from: &str, to: &str) -> String {
    format!("Trạng thái được thay đổi từ: \"{from}\" → \"{to}\"")
}

/// System comment summarising edited fields. `None` when nothing changed.
#[must_use]
pub fn update_comment(changes: &[String]) -> Option<String> {
    if changes.is_empty() {
        None
    } else {
        Some(format!("Đã cập nhật: {}", changes.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_priority_sla() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).single().expect("ts");
        assert_eq!(
            TicketPriority::Urgent.expected_completion(created),
            Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).single().expect("ts")
        );
        assert_eq!(TicketPriority::default().sla_days(), 3);
        assert_eq!(TicketPriority::Low.sla_days(), 5);
    }

    #[test]
    fn test_category_parse_canonicalises() {
        assert_eq!(
            "bãi đỗ xe".parse::<TicketCategory>(),
            Ok(TicketCategory::Parking)
        );
        assert_eq!(TicketCategory::Parking.as_str(), "Bãi đỗ xe");
        assert!("Plumbing".parse::<TicketCategory>().is_err());
    }

    #[test]
    fn test_scope_resolves_apartment() {
        assert_eq!(TicketScope::Building.resolve_apartment(Some(7)), Ok(None));
        assert_eq!(TicketScope::Apartment.resolve_apartment(Some(7)), Ok(Some(7)));
        assert_eq!(
            TicketScope::Apartment.resolve_apartment::<i32>(None),
            Err(TicketError::ApartmentRequired)
        );
    }

    #[test]
    fn test_subject_limits() {
        assert_eq!(validate_subject("  Rò nước  "), Ok("Rò nước".to_owned()));
        assert!(validate_subject(" ab ").is_err());
        assert!(validate_subject(&"x".repeat(256)).is_err());
        assert!(validate_subject(&"ư".repeat(255)).is_ok());
    }

    #[test]
    fn test_description_and_comment() {
        assert_eq!(validate_description(Some("   ")), Ok(None));
        assert!(validate_description(Some(&"a".repeat(4001))).is_err());
        assert!(validate_comment("").is_err());
        assert_eq!(validate_comment(" ok "), Ok("ok".to_owned()));
    }

    #[test]
    fn test_expected_completion_lead_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).single().expect("ts");
        assert!(validate_expected_completion(&(now + Duration::minutes(29)), &now).is_err());
        assert!(validate_expected_completion(&(now + Duration::minutes(30)), &now).is_ok());
    }

    #[test]
    fn test_system_comments() {
        assert_eq!(
            status_change_comment("Mới tạo", "Đã tiếp nhận"),
            "Trạng thái được thay đổi từ: \"Mới tạo\" → \"Đã tiếp nhận\""
        );
        assert_eq!(update_comment(&[]), None);
        assert_eq!(
            update_comment(&["Tiêu đề".to_owned(), "Ưu tiên".to_owned()]),
            Some("Đã cập nhật: Tiêu đề; Ưu tiên".to_owned())
        );
    }
}
