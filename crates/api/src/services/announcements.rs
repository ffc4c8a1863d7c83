//! Announcements and their visibility windows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sams_core::{AnnouncementId, AnnouncementStatus, Page};

use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::AnnouncementRepository;
use crate::models::announcement::{
    Announcement, AnnouncementData, AnnouncementFilter, AnnouncementInput, scopes,
};
use crate::models::session::CurrentUser;

const MAX_TITLE_CHARS: usize = 200;

/// Announcement business rules.
pub struct AnnouncementService<'a> {
    announcements: AnnouncementRepository<'a>,
    clock: BuildingClock,
}

impl<'a> AnnouncementService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            announcements: AnnouncementRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        filter: &AnnouncementFilter,
    ) -> Result<Page<Announcement>, ServiceError> {
        Ok(self.announcements.list(filter).await?)
    }

    /// Announcements the caller can see right now.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn active_for(&self, caller: &CurrentUser) -> Result<Vec<Announcement>, ServiceError> {
        let scope = if caller.is_staff() {
            scopes::STAFF
        } else {
            scopes::RESIDENTS
        };
        Ok(self.announcements.active(scope, self.clock.now()).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the announcement does not exist.
    pub async fn get(&self, id: AnnouncementId) -> Result<Announcement, ServiceError> {
        self.announcements
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy thông báo"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a blank title or content, an
    /// unknown scope, or a window ending before it starts.
    pub async fn create(
        &self,
        input: &AnnouncementInput,
        caller: &CurrentUser,
    ) -> Result<Announcement, ServiceError> {
        let now = self.clock.now();
        let mut data = validate(input, now)?;
        data.status = initial_status(input, &data, now);
        let created = self.announcements.create(&data, &caller.username).await?;
        tracing::info!(
            announcement_id = %created.id,
            status = %created.status,
            scope = %created.visibility_scope,
            "Announcement created"
        );
        Ok(created)
    }

    /// Replace an announcement. User-facing kinds get their status derived
    /// again; system kinds keep the status they had.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` as for [`Self::create`].
    pub async fn update(
        &self,
        id: AnnouncementId,
        input: &AnnouncementInput,
        caller: &CurrentUser,
    ) -> Result<Announcement, ServiceError> {
        let existing = self.get(id).await?;
        let now = self.clock.now();
        let mut data = validate(input, now)?;
        data.schedule_id = existing.schedule_id;
        data.booking_id = existing.booking_id;
        data.status = if existing.announcement_type.derives_status()
            || data.announcement_type.derives_status()
        {
            initial_status(input, &data, now)
        } else {
            existing.status
        };
        Ok(self.announcements.update(id, &data, &caller.username).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the announcement does not exist.
    pub async fn delete(&self, id: AnnouncementId) -> Result<(), ServiceError> {
        self.announcements.delete(id).await?;
        Ok(())
    }

    /// Activate opened windows and expire closed ones.
    ///
    /// Returns `(activated, expired)`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if an update fails.
    pub async fn refresh_statuses(&self) -> Result<(u64, u64), ServiceError> {
        let now = self.clock.now();
        let activated = self.announcements.activate_due(now).await?;
        let expired = self.announcements.expire_due(now).await?;
        Ok((activated, expired))
    }
}

fn validate(input: &AnnouncementInput, now: DateTime<Utc>) -> Result<AnnouncementData, ServiceError> {
    let title = non_blank(Some(&input.title))
        .ok_or_else(|| ServiceError::validation("Tiêu đề không được để trống"))?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ServiceError::validation("Tiêu đề không được vượt quá 200 ký tự"));
    }
    let content = non_blank(Some(&input.content))
        .ok_or_else(|| ServiceError::validation("Nội dung không được để trống"))?;

    let visible_from = input.visible_from.unwrap_or(now);
    if input.visible_to.is_some_and(|to| to < visible_from) {
        return Err(ServiceError::validation(
            "Thời gian kết thúc phải bằng hoặc sau thời gian bắt đầu",
        ));
    }

    Ok(AnnouncementData {
        title,
        content,
        visible_from,
        visible_to: input.visible_to,
        visibility_scope: normalize_scope(input.visibility_scope.as_deref())?,
        status: AnnouncementStatus::Active,
        is_pinned: input.is_pinned,
        announcement_type: input.announcement_type,
        schedule_id: None,
        booking_id: None,
    })
}

/// An explicit INACTIVE wins; otherwise the window decides.
fn initial_status(
    input: &AnnouncementInput,
    data: &AnnouncementData,
    now: DateTime<Utc>,
) -> AnnouncementStatus {
    if input.status == Some(AnnouncementStatus::Inactive) {
        return AnnouncementStatus::Inactive;
    }
    AnnouncementStatus::derive(&data.visible_from, data.visible_to.as_ref(), &now)
}

fn normalize_scope(scope: Option<&str>) -> Result<String, ServiceError> {
    match scope.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(scopes::ALL.to_owned()),
        Some(s) => [scopes::ALL, scopes::RESIDENTS, scopes::STAFF]
            .into_iter()
            .find(|known| known.eq_ignore_ascii_case(s))
            .map(ToOwned::to_owned)
            .ok_or_else(|| ServiceError::Validation(format!("Phạm vi hiển thị không hợp lệ: {s}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use sams_core::AnnouncementType;

    use super::*;

    fn input(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> AnnouncementInput {
        AnnouncementInput {
            title: " Cắt nước ".to_string(),
            content: "Tòa A cắt nước từ 8h đến 11h".to_string(),
            visible_from: from,
            visible_to: to,
            visibility_scope: Some("residents".to_string()),
            status: None,
            is_pinned: false,
            announcement_type: AnnouncementType::Announcement,
        }
    }

    #[test]
    fn test_validate_defaults_and_trims() {
        let now = Utc::now();
        let data = validate(&input(None, None), now).unwrap();
        assert_eq!(data.title, "Cắt nước");
        assert_eq!(data.visible_from, now);
        assert_eq!(data.visibility_scope, "RESIDENTS");
    }

    #[test]
    fn test_validate_rejects_reversed_window() {
        let now = Utc::now();
        let err = validate(&input(Some(now), Some(now - Duration::hours(1))), now).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(validate(&input(Some(now), Some(now)), now).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_scope() {
        let mut bad = input(None, None);
        bad.visibility_scope = Some("tenants".to_string());
        assert!(validate(&bad, Utc::now()).is_err());
    }

    #[test]
    fn test_initial_status() {
        let now = Utc::now();
        let future = input(Some(now + Duration::days(1)), None);
        let data = validate(&future, now).unwrap();
        assert_eq!(initial_status(&future, &data, now), AnnouncementStatus::Scheduled);

        let mut hidden = future.clone();
        hidden.status = Some(AnnouncementStatus::Inactive);
        assert_eq!(initial_status(&hidden, &data, now), AnnouncementStatus::Inactive);

        let mut forced = input(None, None);
        forced.status = Some(AnnouncementStatus::Expired);
        let data = validate(&forced, now).unwrap();
        assert_eq!(initial_status(&forced, &data, now), AnnouncementStatus::Active);
    }
}
