//! Document repository: documents, their versions and the action log.
//!
//! Every state change writes its log row in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use sams_core::log::extract_username;
use sams_core::{ActionLogId, DocumentAction, DocumentId, DocumentStatus, DocumentVersionId, UserId};

use super::{RepositoryError, conflict_on_unique, parse_column};
use crate::models::document::{
    DEFAULT_VISIBILITY, Document, DocumentDetail, DocumentFilter, DocumentInput, DocumentLog,
    DocumentVersion, FileInput,
};

/// A log row to write alongside a document change.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub action: DocumentAction,
    pub actor_id: Option<UserId>,
    pub detail: String,
}

/// Metadata written by an edit or a rollback.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub title: String,
    pub category: String,
    pub visibility_scope: String,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: DocumentId,
    category: String,
    title: String,
    visibility_scope: String,
    status: String,
    current_version: Option<i32>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    #[sqlx(flatten)]
    latest: LatestVersionRow,
}

/// Columns of the latest version, all nullable through the lateral join.
#[derive(Debug, sqlx::FromRow)]
struct LatestVersionRow {
    v_id: Option<DocumentVersionId>,
    v_version_no: Option<i32>,
    v_file_url: Option<String>,
    v_file_name: Option<String>,
    v_mime_type: Option<String>,
    v_file_size: Option<i64>,
    v_note: Option<String>,
    v_uploaded_by: Option<String>,
    v_uploaded_at: Option<DateTime<Utc>>,
}

impl LatestVersionRow {
    fn into_version(self, document_id: DocumentId) -> Option<DocumentVersion> {
        Some(DocumentVersion {
            id: self.v_id?,
            document_id,
            version_no: self.v_version_no?,
            file_url: self.v_file_url?,
            file_name: self.v_file_name?,
            mime_type: self.v_mime_type,
            file_size: self.v_file_size,
            note: self.v_note,
            uploaded_by: self.v_uploaded_by,
            uploaded_at: self.v_uploaded_at?,
        })
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = RepositoryError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            category: row.category,
            title: row.title,
            visibility_scope: row.visibility_scope,
            status: parse_column::<DocumentStatus>(&row.status, "status")?,
            current_version: row.current_version,
            created_at: row.created_at,
            created_by: row.created_by,
            latest_version: row.latest.into_version(row.id),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: DocumentVersionId,
    document_id: DocumentId,
    version_no: i32,
    file_url: String,
    file_name: String,
    mime_type: Option<String>,
    file_size: Option<i64>,
    note: Option<String>,
    uploaded_by: Option<String>,
    uploaded_at: DateTime<Utc>,
}

impl From<VersionRow> for DocumentVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            version_no: row.version_no,
            file_url: row.file_url,
            file_name: row.file_name,
            mime_type: row.mime_type,
            file_size: row.file_size,
            note: row.note,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: ActionLogId,
    document_id: DocumentId,
    action: String,
    actor_id: Option<UserId>,
    actor_username: Option<String>,
    action_at: DateTime<Utc>,
    detail: Option<String>,
}

impl TryFrom<LogRow> for DocumentLog {
    type Error = RepositoryError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        // Rows without a resolvable actor name the user in their detail text.
        let actor_name = row
            .actor_username
            .or_else(|| row.detail.as_deref().and_then(extract_username));
        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            action: parse_column::<DocumentAction>(&row.action, "action")?,
            actor_id: row.actor_id,
            actor_name,
            action_at: row.action_at,
            detail: row.detail,
        })
    }
}

const DOCUMENT_SELECT: &str = "
    SELECT d.id, d.category, d.title, d.visibility_scope, d.status, d.current_version,
           d.created_at, d.created_by,
           v.id AS v_id, v.version_no AS v_version_no, v.file_url AS v_file_url,
           v.file_name AS v_file_name, v.mime_type AS v_mime_type,
           v.file_size AS v_file_size, v.note AS v_note,
           v.uploaded_by AS v_uploaded_by, v.uploaded_at AS v_uploaded_at
    FROM building.documents d
    LEFT JOIN LATERAL (
        SELECT * FROM building.document_versions dv
        WHERE dv.document_id = d.id
        ORDER BY dv.version_no DESC
        LIMIT 1
    ) v ON TRUE";

const LOG_SELECT: &str = "
    SELECT l.id, l.document_id, l.action, l.actor_id, u.username AS actor_username,
           l.action_at, l.detail
    FROM building.document_action_logs l
    LEFT JOIN building.users u ON u.id = l.actor_id";

async fn insert_log(
    conn: &mut sqlx::PgConnection,
    document_id: DocumentId,
    log: &LogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO building.document_action_logs (id, document_id, action, actor_id, detail)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(ActionLogId::new_v4())
    .bind(document_id)
    .bind(log.action.as_str())
    .bind(log.actor_id)
    .bind(&log.detail)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_version(
    conn: &mut sqlx::PgConnection,
    document_id: DocumentId,
    version_no: i32,
    file: &FileInput,
    uploaded_by: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO building.document_versions
            (id, document_id, version_no, file_url, file_name, mime_type, file_size, note, uploaded_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(DocumentVersionId::new_v4())
    .bind(document_id)
    .bind(version_no)
    .bind(&file.file_url)
    .bind(&file.file_name)
    .bind(file.mime_type.as_deref())
    .bind(file.file_size)
    .bind(file.note.as_deref())
    .bind(uploaded_by)
    .execute(conn)
    .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for building documents.
pub struct DocumentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DocumentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Documents with their latest version, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(DOCUMENT_SELECT);
        qb.push(" WHERE NOT d.is_deleted");
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND d.title ILIKE ").push_bind(format!("%{q}%"));
        }
        if let Some(category) = filter.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND d.category = ").push_bind(category.to_owned());
        }
        if let Some(status) = filter.status {
            qb.push(" AND d.status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY d.created_at DESC");

        let rows: Vec<DocumentRow> = qb.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DocumentId) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "{DOCUMENT_SELECT} WHERE d.id = $1 AND NOT d.is_deleted"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Document with every version and log row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: DocumentId) -> Result<Option<DocumentDetail>, RepositoryError> {
        let Some(document) = self.get(id).await? else {
            return Ok(None);
        };
        let versions = self.versions(id).await?;
        let logs = self.logs(id).await?;
        Ok(Some(DocumentDetail {
            document,
            versions,
            logs,
        }))
    }

    /// Versions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn versions(&self, id: DocumentId) -> Result<Vec<DocumentVersion>, RepositoryError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT id, document_id, version_no, file_url, file_name, mime_type, file_size,
                    note, uploaded_by, uploaded_at
             FROM building.document_versions
             WHERE document_id = $1
             ORDER BY version_no DESC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Action log, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn logs(&self, id: DocumentId) -> Result<Vec<DocumentLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "{LOG_SELECT} WHERE l.document_id = $1 ORDER BY l.action_at DESC, l.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// The most recent log row of one action.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_log(
        &self,
        id: DocumentId,
        action: DocumentAction,
    ) -> Result<Option<DocumentLog>, RepositoryError> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "{LOG_SELECT} WHERE l.document_id = $1 AND l.action = $2
             ORDER BY l.action_at DESC LIMIT 1"
        ))
        .bind(id)
        .bind(action.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Highest version number, or 0 for a document without versions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn max_version(&self, id: DocumentId) -> Result<i32, RepositoryError> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(version_no) FROM building.document_versions WHERE document_id = $1",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(max.unwrap_or(0))
    }

    /// Create a pending document with version 1 and its CREATE log row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create(
        &self,
        input: &DocumentInput,
        actor: &str,
        log: &LogEntry,
    ) -> Result<Document, RepositoryError> {
        let id = DocumentId::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO building.documents
                (id, category, title, visibility_scope, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(input.category.trim())
        .bind(input.title.trim())
        .bind(input.visibility_scope.as_deref().unwrap_or(DEFAULT_VISIBILITY))
        .bind(DocumentStatus::PendingApproval.as_str())
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        insert_version(&mut tx, id, 1, &input.file, actor).await?;
        insert_log(&mut tx, id, log).await?;
        tx.commit().await?;

        tracing::info!(document_id = %id, title = %input.title, "Document created");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Add a version and send the document back for approval.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the version number was taken
    /// concurrently.
    pub async fn add_version(
        &self,
        id: DocumentId,
        version_no: i32,
        file: &FileInput,
        actor: &str,
        log: &LogEntry,
    ) -> Result<Document, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        insert_version(&mut tx, id, version_no, file, actor)
            .await
            .map_err(|e| conflict_on_unique(e, "version was uploaded concurrently"))?;
        sqlx::query("UPDATE building.documents SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(DocumentStatus::PendingApproval.as_str())
            .execute(&mut *tx)
            .await?;
        insert_log(&mut tx, id, log).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Write a status (and optionally the published version) with its log row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the document does not exist.
    pub async fn set_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        current_version: Option<i32>,
        metadata: Option<&Metadata>,
        log: &LogEntry,
    ) -> Result<Document, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE building.documents
             SET status = $2, current_version = COALESCE($3, current_version)
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(current_version)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(meta) = metadata {
            write_metadata(&mut tx, id, meta).await?;
        }
        insert_log(&mut tx, id, log).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Write edited metadata, move the document to `status` and log it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the document does not exist.
    pub async fn update_metadata(
        &self,
        id: DocumentId,
        metadata: &Metadata,
        status: DocumentStatus,
        log: &LogEntry,
    ) -> Result<Document, RepositoryError> {
        self.set_status(id, status, None, Some(metadata), log).await
    }

    /// Remove a document from listings for good.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the document does not exist.
    pub async fn mark_deleted(&self, id: DocumentId, log: &LogEntry) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE building.documents SET is_deleted = TRUE, status = $2
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(DocumentStatus::Deleted.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        insert_log(&mut tx, id, log).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn write_metadata(
    conn: &mut sqlx::PgConnection,
    id: DocumentId,
    meta: &Metadata,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE building.documents SET title = $2, category = $3, visibility_scope = $4 WHERE id = $1",
    )
    .bind(id)
    .bind(&meta.title)
    .bind(&meta.category)
    .bind(&meta.visibility_scope)
    .execute(conn)
    .await?;
    Ok(())
}
