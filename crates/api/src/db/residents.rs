//! Resident repository and apartment links.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::{ApartmentId, Page, ResidentId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Paged;
use crate::models::building::{
    ApartmentContact, ApartmentLinkInput, Resident, ResidentApartment, ResidentFilter,
    ResidentInput,
};

const DEFAULT_RELATION: &str = "OWNER";
const DEFAULT_STATUS: &str = "ACTIVE";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ResidentRow {
    id: ResidentId,
    user_id: Option<UserId>,
    full_name: String,
    phone: Option<String>,
    email: Option<String>,
    id_number: Option<String>,
    dob: Option<NaiveDate>,
    gender: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResidentRow {
    fn into_resident(self, apartments: Vec<ResidentApartment>) -> Resident {
        Resident {
            id: self.id,
            user_id: self.user_id,
            full_name: self.full_name,
            phone: self.phone,
            email: self.email,
            id_number: self.id_number,
            dob: self.dob,
            gender: self.gender,
            status: self.status,
            apartments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LinkRow {
    resident_id: ResidentId,
    apartment_id: ApartmentId,
    apartment_number: String,
    relation_type: String,
    is_primary: bool,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

impl From<LinkRow> for ResidentApartment {
    fn from(row: LinkRow) -> Self {
        Self {
            apartment_id: row.apartment_id,
            apartment_number: row.apartment_number,
            relation_type: row.relation_type,
            is_primary: row.is_primary,
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

const RESIDENT_COLUMNS: &str = "r.id, r.user_id, r.full_name, r.phone, r.email, r.id_number, \
                                r.dob, r.gender, r.status, r.created_at, r.updated_at";

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ResidentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (r.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.phone ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.id_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(apartment_id) = filter.apartment_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM building.resident_apartments ra
                          WHERE ra.resident_id = r.id AND ra.apartment_id = ",
        )
        .push_bind(apartment_id)
        .push(")");
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for residents and their apartment links.
pub struct ResidentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ResidentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn links_for(
        &self,
        ids: &[ResidentId],
    ) -> Result<HashMap<ResidentId, Vec<ResidentApartment>>, RepositoryError> {
        let raw: Vec<uuid::Uuid> = ids.iter().map(ResidentId::as_uuid).collect();
        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT ra.resident_id, ra.apartment_id, a.number AS apartment_number,
                    ra.relation_type, ra.is_primary, ra.start_date, ra.end_date
             FROM building.resident_apartments ra
             JOIN building.apartments a ON a.id = ra.apartment_id
             WHERE ra.resident_id = ANY($1)
             ORDER BY ra.is_primary DESC, a.number",
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<ResidentId, Vec<ResidentApartment>> = HashMap::new();
        for row in rows {
            grouped.entry(row.resident_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ResidentFilter) -> Result<Page<Resident>, RepositoryError> {
        let request = filter.page_request();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM building.residents r");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RESIDENT_COLUMNS} FROM building.residents r"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY r.full_name LIMIT ")
            .push_bind(request.limit())
            .push(" OFFSET ")
            .push_bind(request.offset());
        let rows: Vec<ResidentRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let ids: Vec<ResidentId> = rows.iter().map(|r| r.id).collect();
        let mut links = self.links_for(&ids).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let apartments = links.remove(&row.id).unwrap_or_default();
                row.into_resident(apartments)
            })
            .collect();
        Ok(Page::new(items, total, request))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ResidentId) -> Result<Option<Resident>, RepositoryError> {
        let row = sqlx::query_as::<_, ResidentRow>(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM building.residents r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let apartments = self.links_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(row.into_resident(apartments)))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID number is already registered.
    pub async fn create(&self, input: &ResidentInput) -> Result<Resident, RepositoryError> {
        let id = ResidentId::new_v4();
        sqlx::query(
            "INSERT INTO building.residents
                (id, user_id, full_name, phone, email, id_number, dob, gender, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(input.user_id)
        .bind(input.full_name.trim())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(input.id_number.as_deref())
        .bind(input.dob)
        .bind(input.gender.as_deref())
        .bind(input.status.as_deref().unwrap_or(DEFAULT_STATUS))
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "ID number already registered"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the resident does not exist.
    pub async fn update(
        &self,
        id: ResidentId,
        input: &ResidentInput,
    ) -> Result<Resident, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.residents
             SET user_id = $2, full_name = $3, phone = $4, email = $5, id_number = $6,
                 dob = $7, gender = $8, status = COALESCE($9, status), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.user_id)
        .bind(input.full_name.trim())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(input.id_number.as_deref())
        .bind(input.dob)
        .bind(input.gender.as_deref())
        .bind(input.status.as_deref())
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "ID number already registered"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Link a resident to an apartment. A new primary link demotes the
    /// apartment's previous primary resident.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the link already exists.
    pub async fn link_apartment(
        &self,
        id: ResidentId,
        link: &ApartmentLinkInput,
        today: NaiveDate,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if link.is_primary {
            sqlx::query(
                "UPDATE building.resident_apartments SET is_primary = FALSE
                 WHERE apartment_id = $1 AND is_primary",
            )
            .bind(link.apartment_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO building.resident_apartments
                (resident_id, apartment_id, relation_type, is_primary, start_date)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(link.apartment_id)
        .bind(link.relation_type.as_deref().unwrap_or(DEFAULT_RELATION))
        .bind(link.is_primary)
        .bind(link.start_date.unwrap_or(today))
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "resident is already linked to this apartment"))?;

        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such link exists.
    pub async fn unlink_apartment(
        &self,
        id: ResidentId,
        apartment_id: ApartmentId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM building.resident_apartments WHERE resident_id = $1 AND apartment_id = $2",
        )
        .bind(id)
        .bind(apartment_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// The resident to email about an apartment: the primary link first,
    /// then the earliest current link, skipping residents without email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn primary_contact(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Option<ApartmentContact>, RepositoryError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT r.full_name, r.email
             FROM building.resident_apartments ra
             JOIN building.residents r ON r.id = ra.resident_id
             WHERE ra.apartment_id = $1
               AND ra.end_date IS NULL
               AND r.email IS NOT NULL AND r.email <> ''
             ORDER BY ra.is_primary DESC, ra.start_date
             LIMIT 1",
        )
        .bind(apartment_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(full_name, email)| ApartmentContact { full_name, email }))
    }

    /// Apartments a resident user is currently linked to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn apartments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ApartmentId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ApartmentId>(
            "SELECT ra.apartment_id
             FROM building.resident_apartments ra
             JOIN building.residents r ON r.id = ra.resident_id
             WHERE r.user_id = $1 AND ra.end_date IS NULL
             ORDER BY ra.is_primary DESC, ra.start_date",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// User accounts of the residents currently linked to an apartment,
    /// primary resident first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn users_for_apartment(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, UserId>(
            "SELECT r.user_id
             FROM building.resident_apartments ra
             JOIN building.residents r ON r.id = ra.resident_id
             WHERE ra.apartment_id = $1 AND ra.end_date IS NULL AND r.user_id IS NOT NULL
             ORDER BY ra.is_primary DESC, ra.start_date",
        )
        .bind(apartment_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}
