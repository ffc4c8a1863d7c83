//! Access card issuing. Every mutation appends to the card's history.

use sqlx::PgPool;

use sams_core::{ApartmentId, CardId, CardNumber, Page, UserId};

use super::ServiceError;
use crate::clock::BuildingClock;
use crate::db::{AccessCardRepository, ApartmentRepository, UserRepository};
use crate::models::access_card::{
    AccessCard, AccessCardFilter, AccessCardInput, CardEvent, CardHistory, events,
};
use crate::models::session::CurrentUser;

/// Access card business rules.
pub struct AccessCardService<'a> {
    pool: &'a PgPool,
    cards: AccessCardRepository<'a>,
    clock: BuildingClock,
}

impl<'a> AccessCardService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            pool,
            cards: AccessCardRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &AccessCardFilter) -> Result<Page<AccessCard>, ServiceError> {
        Ok(self.cards.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the card does not exist.
    pub async fn get(&self, id: CardId) -> Result<AccessCard, ServiceError> {
        self.cards
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy thẻ"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the card does not exist.
    pub async fn history(&self, id: CardId) -> Result<Vec<CardHistory>, ServiceError> {
        self.get(id).await?;
        Ok(self.cards.history(id).await?)
    }

    /// Issue a card.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed number, an
    /// unknown apartment or user, or an expiry before issue, and
    /// `ServiceError::Conflict` when the number is in use.
    pub async fn create(
        &self,
        input: &AccessCardInput,
        caller: &CurrentUser,
    ) -> Result<AccessCard, ServiceError> {
        let number = CardNumber::parse(&input.card_number)?;
        let issued_date = input.issued_date.unwrap_or_else(|| self.clock.now());
        check_expiry(input, issued_date)?;
        let apartment = self.check_holder(input.issued_to_apartment_id, input.issued_to_user_id).await?;

        if self.cards.number_taken(&number, None).await? {
            return Err(taken(&number));
        }

        let event = CardEvent {
            event_code: events::CREATED,
            field_name: None,
            old_value: None,
            new_value: Some(number.to_string()),
            description: match apartment {
                Some(apt) => format!("Cấp thẻ {number} cho căn hộ {apt}"),
                None => format!("Cấp thẻ {number}"),
            },
        };
        Ok(self
            .cards
            .create(&number, input, issued_date, &[event], &caller.username)
            .await?)
    }

    /// Replace a card's details, recording one history row per changed
    /// field.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::create`].
    pub async fn update(
        &self,
        id: CardId,
        input: &AccessCardInput,
        caller: &CurrentUser,
    ) -> Result<AccessCard, ServiceError> {
        let existing = self.get(id).await?;
        let number = CardNumber::parse(&input.card_number)?;
        check_expiry(input, input.issued_date.unwrap_or(existing.issued_date))?;
        let apartment = self.check_holder(input.issued_to_apartment_id, input.issued_to_user_id).await?;

        if number.as_str() != existing.card_number && self.cards.number_taken(&number, Some(id)).await? {
            return Err(taken(&number));
        }

        let mut changes = card_changes(&existing, &number, input, apartment.as_deref());
        if changes.is_empty() {
            changes.push(CardEvent {
                event_code: events::UPDATED,
                field_name: None,
                old_value: None,
                new_value: None,
                description: "Cập nhật thẻ (không thay đổi dữ liệu)".to_owned(),
            });
        }
        let updated = self
            .cards
            .update(id, &number, input, &changes, &caller.username)
            .await?;
        tracing::info!(card_id = %id, changes = changes.len(), by = %caller.username, "Access card updated");
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the card does not exist.
    pub async fn delete(&self, id: CardId, caller: &CurrentUser) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let event = CardEvent {
            event_code: events::DELETED,
            field_name: None,
            old_value: Some(existing.card_number.clone()),
            new_value: None,
            description: format!("Xóa thẻ {}", existing.card_number),
        };
        self.cards.soft_delete(id, &event, &caller.username).await?;
        Ok(())
    }

    /// Resolve the apartment number and make sure the holder exists.
    async fn check_holder(
        &self,
        apartment_id: Option<ApartmentId>,
        user_id: Option<UserId>,
    ) -> Result<Option<String>, ServiceError> {
        let apartment = match apartment_id {
            Some(id) => Some(
                ApartmentRepository::new(self.pool)
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::validation("Không tìm thấy căn hộ"))?
                    .number,
            ),
            None => None,
        };
        if let Some(id) = user_id
            && UserRepository::new(self.pool).get_by_id(id).await?.is_none()
        {
            return Err(ServiceError::validation("Không tìm thấy người dùng"));
        }
        Ok(apartment)
    }
}

fn taken(number: &CardNumber) -> ServiceError {
    ServiceError::Conflict(format!("Số thẻ {number} đã tồn tại"))
}

fn check_expiry(
    input: &AccessCardInput,
    issued_date: chrono::DateTime<chrono::Utc>,
) -> Result<(), ServiceError> {
    if input.expired_date.is_some_and(|expiry| expiry <= issued_date) {
        return Err(ServiceError::validation("Ngày hết hạn phải sau ngày cấp"));
    }
    Ok(())
}

/// One history row per field the update changes.
fn card_changes(
    existing: &AccessCard,
    number: &CardNumber,
    input: &AccessCardInput,
    apartment_number: Option<&str>,
) -> Vec<CardEvent> {
    let mut changes = Vec::new();
    let mut field = |name: &'static str, code: &'static str, old: Option<String>, new: Option<String>| {
        if old != new {
            let description = format!(
                "{name}: {} → {}",
                old.as_deref().unwrap_or("(trống)"),
                new.as_deref().unwrap_or("(trống)")
            );
            changes.push(CardEvent {
                event_code: code,
                field_name: Some(name),
                old_value: old,
                new_value: new,
                description,
            });
        }
    };

    field(
        "card_number",
        events::UPDATED,
        Some(existing.card_number.clone()),
        Some(number.to_string()),
    );
    field(
        "status",
        events::STATUS_CHANGED,
        Some(existing.status.to_string()),
        Some(input.status.to_string()),
    );
    if existing.issued_to_apartment_id != input.issued_to_apartment_id {
        field(
            "apartment",
            events::UPDATED,
            existing.apartment_number.clone(),
            apartment_number.map(ToOwned::to_owned),
        );
    }
    field(
        "user",
        events::UPDATED,
        existing.issued_to_user_id.map(|id| id.to_string()),
        input.issued_to_user_id.map(|id| id.to_string()),
    );
    field(
        "expired_date",
        events::UPDATED,
        existing.expired_date.map(|d| d.format("%d/%m/%Y").to_string()),
        input.expired_date.map(|d| d.format("%d/%m/%Y").to_string()),
    );
    changes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use sams_core::CardStatus;

    use super::*;

    fn card() -> AccessCard {
        AccessCard {
            id: CardId::new_v4(),
            card_number: "CARD-A1001-01".to_string(),
            status: CardStatus::Active,
            issued_to_user_id: None,
            issued_to_apartment_id: None,
            apartment_number: None,
            issued_date: Utc::now(),
            expired_date: None,
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    fn input(number: &str, status: CardStatus) -> AccessCardInput {
        AccessCardInput {
            card_number: number.to_string(),
            status,
            issued_to_user_id: None,
            issued_to_apartment_id: None,
            issued_date: None,
            expired_date: None,
        }
    }

    #[test]
    fn test_no_changes_yields_no_events() {
        let existing = card();
        let number = CardNumber::parse("CARD-A1001-01").unwrap();
        let events = card_changes(&existing, &number, &input("CARD-A1001-01", CardStatus::Active), None);
        assert!(events.is_empty());
    }

    #[test]
    fn test_status_and_number_changes() {
        let existing = card();
        let number = CardNumber::parse("CARD-A1001-02").unwrap();
        let changes = card_changes(&existing, &number, &input("CARD-A1001-02", CardStatus::Lost), None);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field_name, Some("card_number"));
        assert_eq!(changes[0].description, "card_number: CARD-A1001-01 → CARD-A1001-02");
        assert_eq!(changes[1].event_code, events::STATUS_CHANGED);
        assert_eq!(changes[1].new_value.as_deref(), Some("LOST"));
    }

    #[test]
    fn test_apartment_change_uses_numbers() {
        let existing = card();
        let number = CardNumber::parse("CARD-A1001-01").unwrap();
        let mut moved = input("CARD-A1001-01", CardStatus::Active);
        moved.issued_to_apartment_id = Some(ApartmentId::new_v4());
        let changes = card_changes(&existing, &number, &moved, Some("A1001"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].description, "apartment: (trống) → A1001");
    }

    #[test]
    fn test_check_expiry() {
        let issued = Utc::now();
        let mut card = input("CARD-A1001-01", CardStatus::Active);
        assert!(check_expiry(&card, issued).is_ok());
        card.expired_date = Some(issued - Duration::days(1));
        assert!(check_expiry(&card, issued).is_err());
        card.expired_date = Some(issued + Duration::days(365));
        assert!(check_expiry(&card, issued).is_ok());
    }
}
