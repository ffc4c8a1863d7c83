//! Invoices, the monthly generation settings and the service price list.
//!
//! Everything here is restricted to finance staff except the service type
//! list, which the ticket and booking screens also read.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use sams_core::{InvoiceId, Page, ServiceTypeId};

use crate::db::{InvoiceConfigRepository, ServiceTypeRepository};
use crate::error::AppError;
use crate::middleware::{RequireFinance, RequireManager, RequireStaff};
use crate::models::invoice::{
    Invoice, InvoiceConfigInput, InvoiceConfiguration, InvoiceDetailInput, InvoiceFilter,
    InvoiceInput, InvoiceStatusInput, InvoiceUpdateInput, InvoiceWithDetails,
    MonthlyGenerationInput, MonthlyGenerationReport, ServiceType,
};
use crate::services::InvoiceService;
use crate::state::AppState;

const MAX_DUE_DAYS: u32 = 365;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", get(list).post(create))
        .route("/api/invoices/generate-monthly", post(generate_monthly))
        .route("/api/invoices/{id}", get(show).put(update).delete(remove))
        .route("/api/invoices/{id}/status", patch(change_status))
        .route("/api/invoices/{id}/details", post(add_detail))
        .route(
            "/api/invoice-configuration",
            get(configuration).put(update_configuration),
        )
        .route("/api/service-types", get(service_types))
        .route("/api/service-types/{id}", get(service_type))
}

async fn list(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<Json<Page<Invoice>>, AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn show(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<InvoiceWithDetails>, AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Json(input): Json<InvoiceInput>,
) -> Result<(StatusCode, Json<InvoiceWithDetails>), AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Json(input): Json<InvoiceUpdateInput>,
) -> Result<Json<Invoice>, AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok(Json(service.update(id, &input, &user).await?))
}

async fn remove(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<StatusCode, AppError> {
    InvoiceService::new(state.pool(), state.email(), state.clock())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Json(input): Json<InvoiceStatusInput>,
) -> Result<Json<Invoice>, AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    let invoice = service
        .change_status(id, input.status, input.note.as_deref(), &user)
        .await?;
    Ok(Json(invoice))
}

async fn add_detail(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Json(input): Json<InvoiceDetailInput>,
) -> Result<(StatusCode, Json<InvoiceWithDetails>), AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok((StatusCode::CREATED, Json(service.add_detail(id, &input, &user).await?)))
}

/// Generate the month's invoices for every active apartment.
async fn generate_monthly(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Json(input): Json<MonthlyGenerationInput>,
) -> Result<Json<MonthlyGenerationReport>, AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    let report = service
        .generate_monthly(input.year, input.month, &user.username)
        .await?;
    Ok(Json(report))
}

async fn configuration(
    RequireFinance(_): RequireFinance,
    State(state): State<AppState>,
) -> Result<Json<InvoiceConfiguration>, AppError> {
    Ok(Json(InvoiceConfigRepository::new(state.pool()).current().await?))
}

async fn update_configuration(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<InvoiceConfigInput>,
) -> Result<Json<InvoiceConfiguration>, AppError> {
    validate_configuration(&input)?;
    let config = InvoiceConfigRepository::new(state.pool())
        .upsert(&input, &user.username)
        .await?;
    tracing::info!(
        day = config.generation_day_of_month,
        due_days = config.due_days_after_issue,
        enabled = config.is_enabled,
        by = %user.username,
        "Invoice configuration updated"
    );
    Ok(Json(config))
}

fn validate_configuration(input: &InvoiceConfigInput) -> Result<(), AppError> {
    if !(1..=31).contains(&input.generation_day_of_month) {
        return Err(AppError::BadRequest(
            "Ngày tạo hóa đơn phải từ 1 đến 31".to_string(),
        ));
    }
    if input.due_days_after_issue == 0 || input.due_days_after_issue > MAX_DUE_DAYS {
        return Err(AppError::BadRequest(format!(
            "Số ngày đến hạn phải từ 1 đến {MAX_DUE_DAYS}"
        )));
    }
    Ok(())
}

async fn service_types(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceType>>, AppError> {
    Ok(Json(ServiceTypeRepository::new(state.pool()).list().await?))
}

async fn service_type(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServiceTypeId>,
) -> Result<Json<ServiceType>, AppError> {
    ServiceTypeRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy loại dịch vụ".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(day: u32, due: u32) -> InvoiceConfigInput {
        InvoiceConfigInput {
            generation_day_of_month: day,
            due_days_after_issue: due,
            is_enabled: true,
            notes: None,
        }
    }

    #[test]
    fn test_validate_configuration() {
        assert!(validate_configuration(&config(1, 40)).is_ok());
        assert!(validate_configuration(&config(31, 365)).is_ok());
        assert!(validate_configuration(&config(0, 40)).is_err());
        assert!(validate_configuration(&config(32, 40)).is_err());
        assert!(validate_configuration(&config(5, 0)).is_err());
        assert!(validate_configuration(&config(5, 366)).is_err());
    }
}
