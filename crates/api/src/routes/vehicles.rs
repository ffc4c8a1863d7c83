//! Registered vehicles.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};

use sams_core::{Page, VehicleId};

use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::vehicle::{Vehicle, VehicleFilter, VehicleInput, VehicleStatusInput};
use crate::services::VehicleService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vehicles", get(list).post(create))
        .route("/api/vehicles/{id}", get(show).put(update))
        .route("/api/vehicles/{id}/status", patch(change_status))
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<VehicleFilter>,
) -> Result<Json<Page<Vehicle>>, AppError> {
    Ok(Json(VehicleService::new(state.pool()).list(&filter).await?))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Result<Json<Vehicle>, AppError> {
    Ok(Json(VehicleService::new(state.pool()).get(id).await?))
}

async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<VehicleInput>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let service = VehicleService::new(state.pool());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    Json(input): Json<VehicleInput>,
) -> Result<Json<Vehicle>, AppError> {
    let service = VehicleService::new(state.pool());
    Ok(Json(service.update(id, &input, &user).await?))
}

async fn change_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    Json(input): Json<VehicleStatusInput>,
) -> Result<Json<Vehicle>, AppError> {
    let service = VehicleService::new(state.pool());
    Ok(Json(service.set_status(id, input.status, &user).await?))
}
