//! Amenities and their bookable packages.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use sams_core::{AmenityId, PackageId, PeriodUnit};

use crate::db::{AmenityRepository, AssetRepository};
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::amenity::{Amenity, AmenityInput, AmenityPackage, PackageInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/amenities", get(list).post(create))
        .route("/api/amenities/{id}", get(show).put(update).delete(remove))
        .route(
            "/api/amenities/{id}/packages",
            get(packages).post(create_package),
        )
        .route(
            "/api/amenities/{id}/packages/{package_id}",
            axum::routing::put(update_package).delete(remove_package),
        )
}

async fn list(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Amenity>>, AppError> {
    Ok(Json(AmenityRepository::new(state.pool()).list().await?))
}

async fn show(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AmenityId>,
) -> Result<Json<Amenity>, AppError> {
    Ok(Json(load(&state, id).await?))
}

async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<AmenityInput>,
) -> Result<(StatusCode, Json<Amenity>), AppError> {
    let input = check_amenity(&state, input).await?;
    let amenity = AmenityRepository::new(state.pool()).create(&input).await?;
    tracing::info!(amenity_id = %amenity.id, code = %amenity.code, by = %user.username, "Amenity created");
    Ok((StatusCode::CREATED, Json(amenity)))
}

async fn update(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AmenityId>,
    Json(input): Json<AmenityInput>,
) -> Result<Json<Amenity>, AppError> {
    let input = check_amenity(&state, input).await?;
    Ok(Json(AmenityRepository::new(state.pool()).update(id, &input).await?))
}

async fn remove(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AmenityId>,
) -> Result<StatusCode, AppError> {
    AmenityRepository::new(state.pool()).soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn packages(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AmenityId>,
) -> Result<Json<Vec<AmenityPackage>>, AppError> {
    load(&state, id).await?;
    Ok(Json(AmenityRepository::new(state.pool()).packages(id).await?))
}

async fn create_package(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<AmenityId>,
    Json(input): Json<PackageInput>,
) -> Result<(StatusCode, Json<AmenityPackage>), AppError> {
    load(&state, id).await?;
    validate_package(&input)?;
    let package = AmenityRepository::new(state.pool())
        .create_package(id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(package)))
}

async fn update_package(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path((id, package_id)): Path<(AmenityId, PackageId)>,
    Json(input): Json<PackageInput>,
) -> Result<Json<AmenityPackage>, AppError> {
    owned_package(&state, id, package_id).await?;
    validate_package(&input)?;
    let package = AmenityRepository::new(state.pool())
        .update_package(package_id, &input)
        .await?;
    Ok(Json(package))
}

async fn remove_package(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path((id, package_id)): Path<(AmenityId, PackageId)>,
) -> Result<StatusCode, AppError> {
    owned_package(&state, id, package_id).await?;
    AmenityRepository::new(state.pool())
        .soft_delete_package(package_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load(state: &AppState, id: AmenityId) -> Result<Amenity, AppError> {
    AmenityRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy tiện ích".to_string()))
}

async fn owned_package(
    state: &AppState,
    amenity_id: AmenityId,
    package_id: PackageId,
) -> Result<AmenityPackage, AppError> {
    AmenityRepository::new(state.pool())
        .get_package(package_id)
        .await?
        .filter(|p| p.amenity_id == amenity_id)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy gói dịch vụ".to_string()))
}

async fn check_amenity(state: &AppState, mut input: AmenityInput) -> Result<AmenityInput, AppError> {
    input.code = input.code.trim().to_uppercase();
    input.name = input.name.trim().to_string();
    if input.code.is_empty() || input.name.is_empty() {
        return Err(AppError::BadRequest(
            "Mã và tên tiện ích không được để trống".to_string(),
        ));
    }
    if let Some(asset_id) = input.asset_id
        && AssetRepository::new(state.pool()).get(asset_id).await?.is_none()
    {
        return Err(AppError::BadRequest("Không tìm thấy tài sản".to_string()));
    }
    Ok(input)
}

fn validate_package(input: &PackageInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Tên gói không được để trống".to_string()));
    }
    if input.price < 0 {
        return Err(AppError::BadRequest("Giá gói không được âm".to_string()));
    }
    let has_length = match input.period_unit {
        PeriodUnit::Day => input.duration_days.is_some_and(|days| days > 0),
        PeriodUnit::Month => input.month_count > 0,
    };
    if !has_length {
        return Err(AppError::BadRequest("Thời hạn gói phải lớn hơn 0".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sams_core::AmenityStatus;

    use super::*;

    fn package(unit: PeriodUnit, months: u32, days: Option<u32>, price: i32) -> PackageInput {
        PackageInput {
            name: "Gói tháng".to_string(),
            month_count: months,
            duration_days: days,
            period_unit: unit,
            price,
            description: None,
            status: AmenityStatus::Active,
        }
    }

    #[test]
    fn test_validate_package() {
        assert!(validate_package(&package(PeriodUnit::Month, 1, None, 300_000)).is_ok());
        assert!(validate_package(&package(PeriodUnit::Day, 1, Some(7), 50_000)).is_ok());
        assert!(validate_package(&package(PeriodUnit::Day, 1, None, 50_000)).is_err());
        assert!(validate_package(&package(PeriodUnit::Month, 0, None, 50_000)).is_err());
        assert!(validate_package(&package(PeriodUnit::Month, 1, None, -1)).is_err());
    }
}
