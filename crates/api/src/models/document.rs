//! Building documents, their uploaded versions and the action log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{ActionLogId, DocumentAction, DocumentId, DocumentStatus, DocumentVersionId, UserId};

/// Visibility used when none is given.
pub const DEFAULT_VISIBILITY: &str = "Public";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub category: String,
    pub title: String,
    pub visibility_scope: String,
    pub status: DocumentStatus,
    pub current_version: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub latest_version: Option<DocumentVersion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: DocumentVersionId,
    pub document_id: DocumentId,
    pub version_no: i32,
    pub file_url: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub note: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLog {
    pub id: ActionLogId,
    pub document_id: DocumentId,
    pub action: DocumentAction,
    pub actor_id: Option<UserId>,
    /// Resolved from the user table, or extracted from `detail`.
    pub actor_name: Option<String>,
    pub action_at: DateTime<Utc>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub versions: Vec<DocumentVersion>,
    pub logs: Vec<DocumentLog>,
}

/// An uploaded file, referenced by URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInput {
    pub file_url: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub category: String,
    pub title: String,
    pub visibility_scope: Option<String>,
    #[serde(flatten)]
    pub file: FileInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadataInput {
    pub title: Option<String>,
    pub category: Option<String>,
    pub visibility_scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusInput {
    pub status: DocumentStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDeleteInput {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    /// Matches title.
    pub q: Option<String>,
    pub category: Option<String>,
    pub status: Option<DocumentStatus>,
}
