//! Building documents.
//!
//! Staff upload and edit; only managers approve or reject. Residents read
//! active documents published to them.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use sams_core::{DocumentId, DocumentStatus};

use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::document::{
    Document, DocumentDeleteInput, DocumentDetail, DocumentFilter, DocumentInput, DocumentLog,
    DocumentMetadataInput, DocumentStatusInput, FileInput,
};
use crate::models::session::CurrentUser;
use crate::services::DocumentService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list).post(create))
        .route(
            "/api/documents/{id}",
            get(show).put(update_metadata).delete(remove),
        )
        .route("/api/documents/{id}/versions", post(add_version))
        .route("/api/documents/{id}/status", patch(change_status))
        .route("/api/documents/{id}/logs", get(logs))
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    let service = DocumentService::new(state.pool());
    Ok(Json(service.list_for(&filter, &user).await?))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<DocumentDetail>, AppError> {
    let service = DocumentService::new(state.pool());
    Ok(Json(service.get_for(id, &user).await?))
}

async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<DocumentInput>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let document = DocumentService::new(state.pool()).create(&input, &user).await?;
    tracing::info!(document_id = %document.id, by = %user.username, "Document created");
    Ok((StatusCode::CREATED, Json(document)))
}

async fn update_metadata(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    Json(input): Json<DocumentMetadataInput>,
) -> Result<Json<Document>, AppError> {
    let service = DocumentService::new(state.pool());
    Ok(Json(service.update_metadata(id, &input, &user).await?))
}

/// Hides an active document; deleting a hidden one removes it.
async fn remove(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    body: Option<Json<DocumentDeleteInput>>,
) -> Result<StatusCode, AppError> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    DocumentService::new(state.pool())
        .delete(id, input.reason.as_deref(), &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_version(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    Json(file): Json<FileInput>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let document = DocumentService::new(state.pool())
        .add_version(id, &file, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn change_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    Json(input): Json<DocumentStatusInput>,
) -> Result<Json<Document>, AppError> {
    check_reviewer(&user, input.status)?;
    let service = DocumentService::new(state.pool());
    Ok(Json(service.change_status(id, &input, &user).await?))
}

async fn logs(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<Vec<DocumentLog>>, AppError> {
    Ok(Json(DocumentService::new(state.pool()).logs(id).await?))
}

/// Approving and rejecting are manager decisions.
fn check_reviewer(user: &CurrentUser, status: DocumentStatus) -> Result<(), AppError> {
    let is_review = matches!(status, DocumentStatus::Active | DocumentStatus::Rejected);
    if is_review && !user.is_manager() {
        return Err(AppError::Forbidden(
            "Chỉ quản lý mới được phê duyệt hoặc từ chối tài liệu".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sams_core::{UserId, UserRole};

    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new_v4(),
            username: "staff".to_string(),
            full_name: "Staff".to_string(),
            role,
        }
    }

    #[test]
    fn test_check_reviewer() {
        let receptionist = user(UserRole::Receptionist);
        assert!(check_reviewer(&receptionist, DocumentStatus::Active).is_err());
        assert!(check_reviewer(&receptionist, DocumentStatus::Rejected).is_err());
        assert!(check_reviewer(&receptionist, DocumentStatus::PendingApproval).is_ok());
        assert!(check_reviewer(&receptionist, DocumentStatus::Inactive).is_ok());
        assert!(check_reviewer(&user(UserRole::Manager), DocumentStatus::Active).is_ok());
    }
}
