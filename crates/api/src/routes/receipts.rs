//! Payment receipts.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use sams_core::{InvoiceId, Page, ReceiptId};

use crate::error::AppError;
use crate::middleware::RequireFinance;
use crate::models::receipt::{Receipt, ReceiptFilter, ReceiptInput};
use crate::services::ReceiptService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/receipts", get(list).post(create))
        .route("/api/receipts/{id}", get(show))
        .route("/api/invoices/{id}/receipt", get(for_invoice))
}

async fn list(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Query(filter): Query<ReceiptFilter>,
) -> Result<Json<Page<Receipt>>, AppError> {
    let service = ReceiptService::new(state.pool(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn show(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<ReceiptId>,
) -> Result<Json<Receipt>, AppError> {
    let service = ReceiptService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn for_invoice(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Receipt>, AppError> {
    let service = ReceiptService::new(state.pool(), state.clock());
    Ok(Json(service.for_invoice(id).await?))
}

async fn create(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Json(input): Json<ReceiptInput>,
) -> Result<(StatusCode, Json<Receipt>), AppError> {
    let service = ReceiptService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}
