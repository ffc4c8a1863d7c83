//! Service price list.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};

use sams_core::{Page, ServicePriceId, ServiceTypeId};

use crate::error::AppError;
use crate::middleware::{RequireFinance, RequireStaff};
use crate::models::invoice::{
    CurrentPrice, CurrentPriceQuery, ServicePrice, ServicePriceFilter, ServicePriceInput,
};
use crate::services::ServicePriceService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/service-types/{id}/prices", get(list).post(create))
        .route("/api/service-types/{id}/current-price", get(current_price))
        .route("/api/service-prices/{id}", put(update).get(show).delete(cancel))
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServiceTypeId>,
    Query(filter): Query<ServicePriceFilter>,
) -> Result<Json<Page<ServicePrice>>, AppError> {
    let service = ServicePriceService::new(state.pool(), state.clock());
    Ok(Json(service.list(id, &filter).await?))
}

async fn current_price(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServiceTypeId>,
    Query(query): Query<CurrentPriceQuery>,
) -> Result<Json<CurrentPrice>, AppError> {
    let service = ServicePriceService::new(state.pool(), state.clock());
    Ok(Json(service.current_price(id, query.date).await?))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServicePriceId>,
) -> Result<Json<ServicePrice>, AppError> {
    let service = ServicePriceService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<ServiceTypeId>,
    Json(input): Json<ServicePriceInput>,
) -> Result<(StatusCode, Json<ServicePrice>), AppError> {
    let service = ServicePriceService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(id, &input, &user).await?)))
}

async fn update(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<ServicePriceId>,
    Json(input): Json<ServicePriceInput>,
) -> Result<Json<ServicePrice>, AppError> {
    let service = ServicePriceService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input).await?))
}

async fn cancel(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<ServicePriceId>,
) -> Result<StatusCode, AppError> {
    ServicePriceService::new(state.pool(), state.clock())
        .cancel(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
