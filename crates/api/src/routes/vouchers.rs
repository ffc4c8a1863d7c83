//! Payment vouchers (phiếu chi).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};

use sams_core::{Page, VoucherId};

use crate::error::AppError;
use crate::middleware::RequireFinance;
use crate::models::voucher::{
    Voucher, VoucherFilter, VoucherInput, VoucherStatusInput, VoucherWithItems,
};
use crate::services::VoucherService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vouchers", get(list).post(create))
        .route("/api/vouchers/{id}", get(show).put(update).delete(remove))
        .route("/api/vouchers/{id}/status", patch(change_status))
}

async fn list(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Query(filter): Query<VoucherFilter>,
) -> Result<Json<Page<Voucher>>, AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn show(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<VoucherId>,
) -> Result<Json<VoucherWithItems>, AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Json(input): Json<VoucherInput>,
) -> Result<(StatusCode, Json<VoucherWithItems>), AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<VoucherId>,
    Json(input): Json<VoucherInput>,
) -> Result<Json<VoucherWithItems>, AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input).await?))
}

async fn remove(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<VoucherId>,
) -> Result<StatusCode, AppError> {
    VoucherService::new(state.pool(), state.clock()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approving a voucher records who approved it and when.
async fn change_status(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<VoucherId>,
    Json(input): Json<VoucherStatusInput>,
) -> Result<Json<Voucher>, AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    Ok(Json(service.change_status(id, input.status, &user).await?))
}
