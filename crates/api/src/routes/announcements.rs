//! Announcements.
//!
//! `GET /api/announcements/active` is what the resident and staff home
//! screens poll; everything else is staff management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use sams_core::{AnnouncementId, Page};

use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::announcement::{Announcement, AnnouncementFilter, AnnouncementInput};
use crate::services::AnnouncementService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/announcements", get(list).post(create))
        .route("/api/announcements/active", get(active))
        .route(
            "/api/announcements/{id}",
            get(show).put(update).delete(remove),
        )
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<AnnouncementFilter>,
) -> Result<Json<Page<Announcement>>, AppError> {
    let service = AnnouncementService::new(state.pool(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn active(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let service = AnnouncementService::new(state.pool(), state.clock());
    Ok(Json(service.active_for(&user).await?))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AnnouncementId>,
) -> Result<Json<Announcement>, AppError> {
    let service = AnnouncementService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<AnnouncementInput>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    let service = AnnouncementService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AnnouncementId>,
    Json(input): Json<AnnouncementInput>,
) -> Result<Json<Announcement>, AppError> {
    let service = AnnouncementService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input, &user).await?))
}

async fn remove(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AnnouncementId>,
) -> Result<StatusCode, AppError> {
    AnnouncementService::new(state.pool(), state.clock())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
