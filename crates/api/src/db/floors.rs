//! Floor repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sams_core::FloorId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::building::{Floor, FloorInput};

#[derive(Debug, sqlx::FromRow)]
struct FloorRow {
    id: FloorId,
    floor_number: i32,
    name: Option<String>,
    apartment_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FloorRow> for Floor {
    fn from(row: FloorRow) -> Self {
        Self {
            id: row.id,
            floor_number: row.floor_number,
            name: row.name,
            apartment_count: row.apartment_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FLOOR_SELECT: &str = "
    SELECT f.id, f.floor_number, f.name, f.created_at, f.updated_at,
           (SELECT COUNT(*) FROM building.apartments a WHERE a.floor_id = f.id) AS apartment_count
    FROM building.floors f";

/// Repository for floors.
pub struct FloorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FloorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Floor>, RepositoryError> {
        let rows = sqlx::query_as::<_, FloorRow>(&format!("{FLOOR_SELECT} ORDER BY f.floor_number"))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: FloorId) -> Result<Option<Floor>, RepositoryError> {
        let row = sqlx::query_as::<_, FloorRow>(&format!("{FLOOR_SELECT} WHERE f.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the floor number exists.
    pub async fn create(&self, input: &FloorInput) -> Result<Floor, RepositoryError> {
        let id = FloorId::new_v4();
        sqlx::query("INSERT INTO building.floors (id, floor_number, name) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(input.floor_number)
            .bind(input.name.as_deref().map(str::trim))
            .execute(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "floor number already exists"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the floor does not exist, or
    /// `RepositoryError::Conflict` if the new number is taken.
    pub async fn update(&self, id: FloorId, input: &FloorInput) -> Result<Floor, RepositoryError> {
        let result = sqlx::query(
            "UPDATE building.floors SET floor_number = $2, name = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(input.floor_number)
        .bind(input.name.as_deref().map(str::trim))
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "floor number already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete an empty floor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while apartments remain on it.
    pub async fn delete(&self, id: FloorId) -> Result<(), RepositoryError> {
        let floor = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        if floor.apartment_count > 0 {
            return Err(RepositoryError::Conflict(format!(
                "floor {} still has {} apartment(s)",
                floor.floor_number, floor.apartment_count
            )));
        }
        sqlx::query("DELETE FROM building.floors WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
