//! Door access cards.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use sams_core::{CardId, Page};

use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::access_card::{AccessCard, AccessCardFilter, AccessCardInput, CardHistory};
use crate::services::AccessCardService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/access-cards", get(list).post(create))
        .route("/api/access-cards/{id}", get(show).put(update).delete(remove))
        .route("/api/access-cards/{id}/history", get(history))
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<AccessCardFilter>,
) -> Result<Json<Page<AccessCard>>, AppError> {
    let service = AccessCardService::new(state.pool(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CardId>,
) -> Result<Json<AccessCard>, AppError> {
    let service = AccessCardService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<AccessCardInput>,
) -> Result<(StatusCode, Json<AccessCard>), AppError> {
    let service = AccessCardService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CardId>,
    Json(input): Json<AccessCardInput>,
) -> Result<Json<AccessCard>, AppError> {
    let service = AccessCardService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input, &user).await?))
}

async fn remove(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CardId>,
) -> Result<StatusCode, AppError> {
    AccessCardService::new(state.pool(), state.clock())
        .delete(id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn history(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CardId>,
) -> Result<Json<Vec<CardHistory>>, AppError> {
    let service = AccessCardService::new(state.pool(), state.clock());
    Ok(Json(service.history(id).await?))
}
