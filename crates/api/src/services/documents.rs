//! Building documents and their approval workflow.
//!
//! Every upload or metadata edit sends a document back to
//! PENDING_APPROVAL. Approving publishes the latest version; rejecting
//! falls back to the previously published version when there is one.
//! Deleting is two-step: an active document is first hidden (INACTIVE),
//! and deleting a hidden document removes it from listings.

use sqlx::PgPool;

use sams_core::{DocumentAction, DocumentId, DocumentStatus};

use super::{ServiceError, non_blank};
use crate::db::DocumentRepository;
use crate::db::documents::{LogEntry, Metadata};
use crate::models::document::{
    DEFAULT_VISIBILITY, Document, DocumentDetail, DocumentFilter, DocumentInput, DocumentLog,
    DocumentMetadataInput, DocumentStatusInput, FileInput,
};
use crate::models::session::CurrentUser;

/// Audiences a document can be published to.
pub const VISIBILITY_SCOPES: [&str; 4] = ["Public", "Accounting", "Receptionist", "Resident"];

const MIN_TITLE_CHARS: usize = 3;
const EMPTY_VALUE: &str = "(trống)";

const TITLE_LABEL: &str = "Tiêu đề";
const CATEGORY_LABEL: &str = "Phân loại";
const SCOPE_LABEL: &str = "Phạm vi";

/// Document business rules.
pub struct DocumentService<'a> {
    documents: DocumentRepository<'a>,
}

impl<'a> DocumentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            documents: DocumentRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, ServiceError> {
        Ok(self.documents.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the document does not exist.
    pub async fn get(&self, id: DocumentId) -> Result<DocumentDetail, ServiceError> {
        self.documents
            .get_detail(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy tài liệu"))
    }

    /// Documents the caller may read. Staff see everything; residents see
    /// active documents published to them.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_for(
        &self,
        filter: &DocumentFilter,
        caller: &CurrentUser,
    ) -> Result<Vec<Document>, ServiceError> {
        let documents = self.list(filter).await?;
        if caller.is_staff() {
            return Ok(documents);
        }
        Ok(documents.into_iter().filter(readable_by_residents).collect())
    }

    /// A document as the caller may see it. Residents get the published
    /// versions only and no action log.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the document does not exist or
    /// is not published to the caller.
    pub async fn get_for(
        &self,
        id: DocumentId,
        caller: &CurrentUser,
    ) -> Result<DocumentDetail, ServiceError> {
        let mut detail = self.get(id).await?;
        if caller.is_staff() {
            return Ok(detail);
        }
        if !readable_by_residents(&detail.document) {
            return Err(ServiceError::not_found("Không tìm thấy tài liệu"));
        }
        let published = detail.document.current_version.unwrap_or(0);
        detail.versions.retain(|v| v.version_no <= published);
        detail.logs.clear();
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the document does not exist.
    pub async fn logs(&self, id: DocumentId) -> Result<Vec<DocumentLog>, ServiceError> {
        self.load(id).await?;
        Ok(self.documents.logs(id).await?)
    }

    /// Create a document awaiting approval, with its file as version 1.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a short title, a blank
    /// category, an unknown visibility scope or a missing file.
    pub async fn create(
        &self,
        input: &DocumentInput,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        let normalized = DocumentInput {
            category: normalize_category(&input.category)?,
            title: normalize_title(&input.title)?,
            visibility_scope: Some(
                normalize_scope(input.visibility_scope.as_deref())?
                    .unwrap_or_else(|| DEFAULT_VISIBILITY.to_owned()),
            ),
            file: validate_file(&input.file)?,
        };
        let log = LogEntry {
            action: DocumentAction::Create,
            actor_id: Some(caller.id),
            detail: format!("Tạo tài liệu bởi {}", caller.username),
        };
        Ok(self
            .documents
            .create(&normalized, &caller.username, &log)
            .await?)
    }

    /// Upload a new version. The document goes back for approval.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` while the document is hidden or
    /// already awaiting approval.
    pub async fn add_version(
        &self,
        id: DocumentId,
        file: &FileInput,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        let document = self.load(id).await?;
        match document.status {
            DocumentStatus::Inactive => {
                return Err(ServiceError::invalid_state(
                    "Tài liệu đang ngừng hiển thị, không thể thêm phiên bản mới.",
                ));
            }
            DocumentStatus::PendingApproval if document.latest_version.is_some() => {
                return Err(ServiceError::invalid_state(
                    "Không thể tải lên phiên bản mới khi tài liệu đang chờ phê duyệt. Vui lòng đợi phê duyệt xong.",
                ));
            }
            _ => {}
        }

        let file = validate_file(file)?;
        let version_no = self.documents.max_version(id).await? + 1;
        let log = LogEntry {
            action: DocumentAction::UploadVersion,
            actor_id: Some(caller.id),
            detail: format!("Tải lên phiên bản v{version_no} bởi {}", caller.username),
        };
        let updated = self
            .documents
            .add_version(id, version_no, &file, &caller.username, &log)
            .await?;
        tracing::info!(document_id = %id, version_no, by = %caller.username, "Document version uploaded");
        Ok(updated)
    }

    /// Approve, reject, hide or ask to republish a document.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a move the workflow does not
    /// allow and `ServiceError::Validation` for DELETED (use `delete`).
    pub async fn change_status(
        &self,
        id: DocumentId,
        input: &DocumentStatusInput,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        let document = self.load(id).await?;
        let detail = non_blank(input.detail.as_deref());

        match input.status {
            DocumentStatus::PendingApproval => self.request_reactivation(document, detail, caller).await,
            DocumentStatus::Active => self.approve(document, detail, caller).await,
            DocumentStatus::Rejected => self.reject(document, detail, caller).await,
            DocumentStatus::Inactive => {
                if document.status == DocumentStatus::Inactive {
                    return Ok(document);
                }
                let log = LogEntry {
                    action: DocumentAction::ChangeStatus,
                    actor_id: Some(caller.id),
                    detail: detail.unwrap_or_else(|| format!("Ngừng hiển thị bởi {}", caller.username)),
                };
                Ok(self
                    .documents
                    .set_status(id, DocumentStatus::Inactive, None, None, &log)
                    .await?)
            }
            DocumentStatus::Deleted => Err(ServiceError::validation(
                "Dùng chức năng xóa để xóa tài liệu",
            )),
        }
    }

    /// Edit title, category or visibility. The document goes back for
    /// approval; an edit that changes nothing is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` while the document is awaiting
    /// approval or hidden.
    pub async fn update_metadata(
        &self,
        id: DocumentId,
        input: &DocumentMetadataInput,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        let document = self.load(id).await?;
        if !document.status.allows_metadata_edit() {
            return Err(ServiceError::invalid_state(
                "Không thể sửa thông tin khi tài liệu đang chờ phê duyệt hoặc đã ngừng hiển thị. Vui lòng đợi phê duyệt xong.",
            ));
        }

        let mut next = Metadata {
            title: document.title.clone(),
            category: document.category.clone(),
            visibility_scope: document.visibility_scope.clone(),
        };
        let mut changes = Vec::new();

        if let Some(title) = input.title.as_deref().filter(|t| !t.trim().is_empty()) {
            let title = normalize_title(title)?;
            if title != next.title {
                changes.push(describe_change(TITLE_LABEL, &next.title, &title));
                next.title = title;
            }
        }
        if let Some(category) = input.category.as_deref().filter(|c| !c.trim().is_empty()) {
            let category = normalize_category(category)?;
            if category != next.category {
                changes.push(describe_change(CATEGORY_LABEL, &next.category, &category));
                next.category = category;
            }
        }
        if let Some(scope) = normalize_scope(input.visibility_scope.as_deref())?
            && scope != next.visibility_scope
        {
            changes.push(describe_change(SCOPE_LABEL, &next.visibility_scope, &scope));
            next.visibility_scope = scope;
        }

        if changes.is_empty() {
            return Ok(document);
        }

        let log = LogEntry {
            action: DocumentAction::UpdateMetadata,
            actor_id: Some(caller.id),
            detail: changes.join("; "),
        };
        Ok(self
            .documents
            .update_metadata(id, &next, DocumentStatus::PendingApproval, &log)
            .await?)
    }

    /// Hide an active document, or remove an already hidden one.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the document does not exist.
    pub async fn delete(
        &self,
        id: DocumentId,
        reason: Option<&str>,
        caller: &CurrentUser,
    ) -> Result<(), ServiceError> {
        let document = self.load(id).await?;
        let reason = non_blank(reason);

        if document.status == DocumentStatus::Inactive {
            let log = LogEntry {
                action: DocumentAction::HardDelete,
                actor_id: Some(caller.id),
                detail: reason.unwrap_or_else(|| "Xóa tài liệu sau khi ngừng hiển thị".to_owned()),
            };
            self.documents.mark_deleted(id, &log).await?;
            tracing::info!(document_id = %id, by = %caller.username, "Document deleted");
        } else {
            let log = LogEntry {
                action: DocumentAction::SoftDelete,
                actor_id: Some(caller.id),
                detail: reason.unwrap_or_else(|| format!("Ngừng hiển thị bởi {}", caller.username)),
            };
            self.documents
                .set_status(id, DocumentStatus::Inactive, None, None, &log)
                .await?;
            tracing::info!(document_id = %id, by = %caller.username, "Document hidden");
        }
        Ok(())
    }

    // ===== Internals =====

    async fn load(&self, id: DocumentId) -> Result<Document, ServiceError> {
        self.documents
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy tài liệu"))
    }

    async fn request_reactivation(
        &self,
        document: Document,
        detail: Option<String>,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        match document.status {
            DocumentStatus::PendingApproval => Ok(document),
            DocumentStatus::Inactive => {
                let log = LogEntry {
                    action: DocumentAction::RequestReactivate,
                    actor_id: Some(caller.id),
                    detail: detail.unwrap_or_else(|| "Yêu cầu bật hiển thị lại tài liệu".to_owned()),
                };
                Ok(self
                    .documents
                    .set_status(document.id, DocumentStatus::PendingApproval, None, None, &log)
                    .await?)
            }
            _ => Err(ServiceError::invalid_state(
                "Chỉ có thể yêu cầu bật hiển thị lại tài liệu đang ở trạng thái 'Ngừng hiển thị'.",
            )),
        }
    }

    async fn approve(
        &self,
        document: Document,
        detail: Option<String>,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        ensure_pending(&document)?;
        let latest = self.documents.max_version(document.id).await?;
        let publish = (latest > 0 && document.current_version.is_none_or(|v| latest > v))
            .then_some(latest);

        let log = LogEntry {
            action: DocumentAction::ChangeStatus,
            actor_id: Some(caller.id),
            detail: detail.unwrap_or_else(|| format!("Phê duyệt bởi {}", caller.username)),
        };
        let approved = self
            .documents
            .set_status(document.id, DocumentStatus::Active, publish, None, &log)
            .await?;
        tracing::info!(
            document_id = %document.id,
            version = ?approved.current_version,
            by = %caller.username,
            "Document approved"
        );
        Ok(approved)
    }

    async fn reject(
        &self,
        document: Document,
        detail: Option<String>,
        caller: &CurrentUser,
    ) -> Result<Document, ServiceError> {
        ensure_pending(&document)?;

        // A pending metadata edit is undone from its own log line.
        let rollback = match self
            .documents
            .latest_log(document.id, DocumentAction::UpdateMetadata)
            .await?
        {
            Some(edit) if self.edit_is_pending(&document, &edit).await? => edit
                .detail
                .as_deref()
                .map(|d| rollback_metadata(d, &document)),
            _ => None,
        };

        let status = if document.current_version.is_some() {
            DocumentStatus::Active
        } else {
            DocumentStatus::Rejected
        };
        let log = LogEntry {
            action: DocumentAction::ChangeStatus,
            actor_id: Some(caller.id),
            detail: match detail {
                Some(reason) => format!("Từ chối bởi {}: {reason}", caller.username),
                None => format!("Từ chối bởi {}", caller.username),
            },
        };
        Ok(self
            .documents
            .set_status(document.id, status, None, rollback.as_ref(), &log)
            .await?)
    }

    /// Whether `edit` is what put the document into review.
    async fn edit_is_pending(
        &self,
        document: &Document,
        edit: &DocumentLog,
    ) -> Result<bool, ServiceError> {
        for action in [DocumentAction::ChangeStatus, DocumentAction::UploadVersion] {
            let later = self
                .documents
                .latest_log(document.id, action)
                .await?
                .is_some_and(|log| log.action_at > edit.action_at);
            if later {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn ensure_pending(document: &Document) -> Result<(), ServiceError> {
    if document.status == DocumentStatus::PendingApproval {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "Tài liệu không ở trạng thái chờ duyệt (hiện tại: {})",
            document.status
        )))
    }
}

/// Published documents shared with everyone or with residents.
fn readable_by_residents(document: &Document) -> bool {
    document.status == DocumentStatus::Active
        && matches!(document.visibility_scope.as_str(), "Public" | "Resident")
}

/// Collapse inner whitespace; titles need at least three characters.
fn normalize_title(title: &str) -> Result<String, ServiceError> {
    let cleaned = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(ServiceError::validation("Tiêu đề không được để trống"));
    }
    if cleaned.chars().count() < MIN_TITLE_CHARS {
        return Err(ServiceError::validation("Tiêu đề phải có ít nhất 3 ký tự"));
    }
    Ok(cleaned)
}

fn normalize_category(category: &str) -> Result<String, ServiceError> {
    non_blank(Some(category)).ok_or_else(|| ServiceError::validation("Phân loại là bắt buộc"))
}

/// Match a scope case-insensitively against the known audiences.
fn normalize_scope(scope: Option<&str>) -> Result<Option<String>, ServiceError> {
    let Some(scope) = scope.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    VISIBILITY_SCOPES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(scope))
        .map(|known| Some((*known).to_owned()))
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "Phạm vi không hợp lệ. Giá trị hợp lệ: {}",
                VISIBILITY_SCOPES.join(", ")
            ))
        })
}

fn validate_file(file: &FileInput) -> Result<FileInput, ServiceError> {
    let file_url = non_blank(Some(&file.file_url))
        .ok_or_else(|| ServiceError::validation("Thiếu đường dẫn tệp"))?;
    let file_name = non_blank(Some(&file.file_name))
        .ok_or_else(|| ServiceError::validation("Thiếu tên tệp"))?;
    if file.file_size.is_some_and(|size| size < 0) {
        return Err(ServiceError::validation("Kích thước tệp không hợp lệ"));
    }
    Ok(FileInput {
        file_url,
        file_name,
        mime_type: non_blank(file.mime_type.as_deref()),
        file_size: file.file_size,
        note: non_blank(file.note.as_deref()),
    })
}

/// `Label: "old" → "new"`, blanks shown as `(trống)`.
fn describe_change(label: &str, old: &str, new: &str) -> String {
    let old = if old.trim().is_empty() { EMPTY_VALUE } else { old };
    format!("{label}: \"{old}\" → \"{new}\"")
}

/// Restore the old values recorded in a metadata-edit log line.
fn rollback_metadata(detail: &str, current: &Document) -> Metadata {
    let mut meta = Metadata {
        title: current.title.clone(),
        category: current.category.clone(),
        visibility_scope: current.visibility_scope.clone(),
    };
    for change in detail.split(';') {
        let Some((before, _)) = change.split_once('→') else {
            continue;
        };
        let Some((label, old)) = before.split_once(':') else {
            continue;
        };
        let Some(old) = quoted(old).filter(|v| *v != EMPTY_VALUE && !v.is_empty()) else {
            continue;
        };
        match label.trim() {
            TITLE_LABEL => meta.title = old.to_owned(),
            CATEGORY_LABEL => meta.category = old.to_owned(),
            SCOPE_LABEL => meta.visibility_scope = old.to_owned(),
            _ => {}
        }
    }
    meta
}

fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn document(status: DocumentStatus) -> Document {
        Document {
            id: DocumentId::new_v4(),
            category: "Nội quy".to_string(),
            title: "Nội quy mới".to_string(),
            visibility_scope: "Public".to_string(),
            status,
            current_version: Some(1),
            created_at: Utc::now(),
            created_by: Some("quocthe".to_string()),
            latest_version: None,
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Nội   quy   tòa nhà ").unwrap(), "Nội quy tòa nhà");
        assert!(normalize_title("   ").is_err());
        assert_eq!(
            normalize_title("ab").unwrap_err().to_string(),
            "Tiêu đề phải có ít nhất 3 ký tự"
        );
        assert!(normalize_title("Nhà").is_ok());
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(normalize_scope(Some("resident")).unwrap(), Some("Resident".to_string()));
        assert_eq!(normalize_scope(Some("  ")).unwrap(), None);
        assert_eq!(normalize_scope(None).unwrap(), None);
        assert!(matches!(normalize_scope(Some("Everyone")), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_validate_file() {
        let file = FileInput {
            file_url: " /files/a.pdf ".to_string(),
            file_name: "a.pdf".to_string(),
            mime_type: Some(" ".to_string()),
            file_size: Some(1024),
            note: None,
        };
        let valid = validate_file(&file).unwrap();
        assert_eq!(valid.file_url, "/files/a.pdf");
        assert_eq!(valid.mime_type, None);

        let blank = FileInput {
            file_url: String::new(),
            ..file
        };
        assert!(validate_file(&blank).is_err());
    }

    #[test]
    fn test_metadata_rollback_restores_old_values() {
        let current = document(DocumentStatus::PendingApproval);
        let detail = [
            describe_change(TITLE_LABEL, "Nội quy cũ", "Nội quy mới"),
            describe_change(SCOPE_LABEL, "Resident", "Public"),
        ]
        .join("; ");
        assert_eq!(
            detail,
            "Tiêu đề: \"Nội quy cũ\" → \"Nội quy mới\"; Phạm vi: \"Resident\" → \"Public\""
        );

        let restored = rollback_metadata(&detail, &current);
        assert_eq!(restored.title, "Nội quy cũ");
        assert_eq!(restored.category, "Nội quy");
        assert_eq!(restored.visibility_scope, "Resident");
    }

    #[test]
    fn test_metadata_rollback_skips_blank_old_values() {
        let current = document(DocumentStatus::PendingApproval);
        let detail = describe_change(CATEGORY_LABEL, "", "Biểu mẫu");
        assert!(detail.contains("(trống)"));
        let restored = rollback_metadata(&detail, &current);
        assert_eq!(restored.category, "Nội quy");
    }

    #[test]
    fn test_ensure_pending() {
        assert!(ensure_pending(&document(DocumentStatus::PendingApproval)).is_ok());
        let err = ensure_pending(&document(DocumentStatus::Active)).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn test_readable_by_residents() {
        assert!(readable_by_residents(&document(DocumentStatus::Active)));
        assert!(!readable_by_residents(&document(DocumentStatus::PendingApproval)));

        let mut internal = document(DocumentStatus::Active);
        internal.visibility_scope = "Accounting".to_string();
        assert!(!readable_by_residents(&internal));
    }
}
