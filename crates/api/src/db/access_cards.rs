//! Access card repository with its change history.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{ApartmentId, CardHistoryId, CardId, CardNumber, CardStatus, Page, UserId};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::Paged;
use crate::models::access_card::{
    AccessCard, AccessCardFilter, AccessCardInput, CardEvent, CardHistory,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CardRow {
    id: CardId,
    card_number: String,
    status: String,
    issued_to_user_id: Option<UserId>,
    issued_to_apartment_id: Option<ApartmentId>,
    apartment_number: Option<String>,
    issued_date: DateTime<Utc>,
    expired_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl TryFrom<CardRow> for AccessCard {
    type Error = RepositoryError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            card_number: row.card_number,
            status: parse_column::<CardStatus>(&row.status, "status")?,
            issued_to_user_id: row.issued_to_user_id,
            issued_to_apartment_id: row.issued_to_apartment_id,
            apartment_number: row.apartment_number,
            issued_date: row.issued_date,
            expired_date: row.expired_date,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: CardHistoryId,
    card_id: CardId,
    event_code: String,
    field_name: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    description: Option<String>,
    event_time: DateTime<Utc>,
    created_by: Option<String>,
}

impl From<HistoryRow> for CardHistory {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            card_id: row.card_id,
            event_code: row.event_code,
            field_name: row.field_name,
            old_value: row.old_value,
            new_value: row.new_value,
            description: row.description,
            event_time: row.event_time,
            created_by: row.created_by,
        }
    }
}

const CARD_SELECT: &str = "
    SELECT c.id, c.card_number, c.status, c.issued_to_user_id, c.issued_to_apartment_id,
           a.number AS apartment_number, c.issued_date, c.expired_date, c.created_at,
           c.created_by, c.updated_at, c.updated_by
    FROM building.access_cards c
    LEFT JOIN building.apartments a ON a.id = c.issued_to_apartment_id";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AccessCardFilter) {
    qb.push(" WHERE NOT c.is_deleted");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND c.card_number ILIKE ").push_bind(format!("%{q}%"));
    }
    if let Some(status) = filter.status {
        qb.push(" AND c.status = ").push_bind(status.as_str());
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(" AND c.issued_to_apartment_id = ").push_bind(apartment_id);
    }
}

async fn append_history(
    conn: &mut sqlx::PgConnection,
    card_id: CardId,
    events: &[CardEvent],
    actor: &str,
) -> Result<(), sqlx::Error> {
    for event in events {
        sqlx::query(
            "INSERT INTO building.card_history
                (id, card_id, event_code, field_name, old_value, new_value, description, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(CardHistoryId::new_v4())
        .bind(card_id)
        .bind(event.event_code)
        .bind(event.field_name)
        .bind(event.old_value.as_deref())
        .bind(event.new_value.as_deref())
        .bind(&event.description)
        .bind(actor)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for door access cards.
pub struct AccessCardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccessCardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &AccessCardFilter) -> Result<Page<AccessCard>, RepositoryError> {
        let request = filter.page_request();

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.access_cards c");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(CARD_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY c.created_at DESC LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<CardRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CardId) -> Result<Option<AccessCard>, RepositoryError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "{CARD_SELECT} WHERE c.id = $1 AND NOT c.is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Whether a live card other than `exclude` already uses the number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn number_taken(
        &self,
        number: &CardNumber,
        exclude: Option<CardId>,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM building.access_cards
                 WHERE card_number = $1 AND NOT is_deleted
                   AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(number.as_str())
        .bind(exclude)
        .fetch_one(self.pool)
        .await?;
        Ok(taken)
    }

    /// Insert a card and its creation history in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the card number is in use.
    pub async fn create(
        &self,
        number: &CardNumber,
        input: &AccessCardInput,
        issued_date: DateTime<Utc>,
        events: &[CardEvent],
        actor: &str,
    ) -> Result<AccessCard, RepositoryError> {
        let id = CardId::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO building.access_cards
                (id, card_number, status, issued_to_user_id, issued_to_apartment_id,
                 issued_date, expired_date, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(number.as_str())
        .bind(input.status.as_str())
        .bind(input.issued_to_user_id)
        .bind(input.issued_to_apartment_id)
        .bind(issued_date)
        .bind(input.expired_date)
        .bind(actor)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "card number already in use"))?;

        append_history(&mut tx, id, events, actor).await?;
        tx.commit().await?;

        tracing::info!(card_id = %id, card_number = %number, "Access card issued");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a card and append the given history rows in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the card does not exist.
    pub async fn update(
        &self,
        id: CardId,
        number: &CardNumber,
        input: &AccessCardInput,
        events: &[CardEvent],
        actor: &str,
    ) -> Result<AccessCard, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE building.access_cards
             SET card_number = $2, status = $3, issued_to_user_id = $4,
                 issued_to_apartment_id = $5, issued_date = COALESCE($6, issued_date),
                 expired_date = $7, updated_at = NOW(), updated_by = $8
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(number.as_str())
        .bind(input.status.as_str())
        .bind(input.issued_to_user_id)
        .bind(input.issued_to_apartment_id)
        .bind(input.issued_date)
        .bind(input.expired_date)
        .bind(actor)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "card number already in use"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        append_history(&mut tx, id, events, actor).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Soft delete a card, recording the event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the card does not exist.
    pub async fn soft_delete(
        &self,
        id: CardId,
        event: &CardEvent,
        actor: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE building.access_cards
             SET is_deleted = TRUE, updated_at = NOW(), updated_by = $2
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        append_history(&mut tx, id, std::slice::from_ref(event), actor).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Card history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: CardId) -> Result<Vec<CardHistory>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, card_id, event_code, field_name, old_value, new_value, description,
                    event_time, created_by
             FROM building.card_history
             WHERE card_id = $1
             ORDER BY event_time DESC, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
