//! Assets and their maintenance schedules.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};

use sams_core::{AssetId, AssetStatus, Page, ScheduleId};

use crate::db::AssetRepository;
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::models::asset::{
    Asset, AssetFilter, AssetInput, MaintenanceSchedule, ScheduleFilter, ScheduleInput,
    ScheduleStatusInput,
};
use crate::services::MaintenanceService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/assets", get(list_assets).post(create_asset))
        .route(
            "/api/assets/{id}",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .route(
            "/api/maintenance-schedules",
            get(list_schedules).post(create_schedule),
        )
        .route(
            "/api/maintenance-schedules/{id}",
            get(get_schedule).put(update_schedule).delete(delete_schedule),
        )
        .route("/api/maintenance-schedules/{id}/status", patch(change_status))
}

// ===== Assets =====

async fn list_assets(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<AssetFilter>,
) -> Result<Json<Page<Asset>>, AppError> {
    Ok(Json(AssetRepository::new(state.pool()).list(&filter).await?))
}

async fn get_asset(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> Result<Json<Asset>, AppError> {
    Ok(Json(load_asset(&state, id).await?))
}

async fn create_asset(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<AssetInput>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    let input = normalize_asset(input)?;
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create_asset(&input, &user).await?)))
}

async fn update_asset(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
    Json(input): Json<AssetInput>,
) -> Result<Json<Asset>, AppError> {
    let input = normalize_asset(input)?;
    Ok(Json(AssetRepository::new(state.pool()).update(id, &input).await?))
}

/// Assets under maintenance cannot be removed.
async fn delete_asset(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> Result<StatusCode, AppError> {
    let asset = load_asset(&state, id).await?;
    if asset.status == AssetStatus::Maintenance {
        return Err(AppError::Conflict(format!(
            "Tài sản {} đang được bảo trì, không thể xóa",
            asset.name
        )));
    }
    AssetRepository::new(state.pool()).soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_asset(state: &AppState, id: AssetId) -> Result<Asset, AppError> {
    AssetRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy tài sản".to_string()))
}

fn normalize_asset(mut input: AssetInput) -> Result<AssetInput, AppError> {
    input.code = input.code.trim().to_uppercase();
    input.name = input.name.trim().to_string();
    if input.code.is_empty() || input.name.is_empty() {
        return Err(AppError::BadRequest(
            "Mã và tên tài sản không được để trống".to_string(),
        ));
    }
    if input.maintenance_frequency_days.is_some_and(|days| days <= 0) {
        return Err(AppError::BadRequest(
            "Chu kỳ bảo trì phải lớn hơn 0 ngày".to_string(),
        ));
    }
    if let (Some(purchased), Some(warranty)) = (input.purchase_date, input.warranty_expire)
        && warranty < purchased
    {
        return Err(AppError::BadRequest(
            "Ngày hết bảo hành phải sau ngày mua".to_string(),
        ));
    }
    Ok(input)
}

// ===== Schedules =====

async fn list_schedules(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<Page<MaintenanceSchedule>>, AppError> {
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok(Json(service.list(&filter).await?))
}

async fn get_schedule(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<MaintenanceSchedule>, AppError> {
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok(Json(service.get(id).await?))
}

async fn create_schedule(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<ScheduleInput>,
) -> Result<(StatusCode, Json<MaintenanceSchedule>), AppError> {
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update_schedule(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<MaintenanceSchedule>, AppError> {
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input).await?))
}

async fn delete_schedule(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
) -> Result<StatusCode, AppError> {
    MaintenanceService::new(state.pool(), state.clock())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ScheduleId>,
    Json(input): Json<ScheduleStatusInput>,
) -> Result<Json<MaintenanceSchedule>, AppError> {
    let service = MaintenanceService::new(state.pool(), state.clock());
    Ok(Json(service.change_status(id, &input, &user).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn asset() -> AssetInput {
        AssetInput {
            code: " elv-a1 ".to_string(),
            name: "Thang máy A1".to_string(),
            apartment_id: None,
            location: Some("Sảnh A".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2023, 1, 10),
            warranty_expire: NaiveDate::from_ymd_opt(2026, 1, 10),
            maintenance_frequency_days: Some(90),
            status: AssetStatus::Active,
        }
    }

    #[test]
    fn test_normalize_asset() {
        assert_eq!(normalize_asset(asset()).unwrap().code, "ELV-A1");

        let mut warranty_first = asset();
        warranty_first.warranty_expire = NaiveDate::from_ymd_opt(2022, 1, 1);
        assert!(normalize_asset(warranty_first).is_err());

        let mut no_cycle = asset();
        no_cycle.maintenance_frequency_days = Some(0);
        assert!(normalize_asset(no_cycle).is_err());
    }
}
