//! Floors, apartments and residents.
//!
//! Plain CRUD over the repositories; staff only.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use rust_decimal::Decimal;

use sams_core::{ApartmentId, Email, FloorId, Page, PhoneNumber, ResidentId};

use crate::db::{ApartmentRepository, FloorRepository, ResidentRepository};
use crate::error::AppError;
use crate::middleware::{RequireManager, RequireStaff};
use crate::models::building::{
    Apartment, ApartmentFilter, ApartmentInput, ApartmentLinkInput, Floor, FloorInput, Resident,
    ResidentFilter, ResidentInput,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/floors", get(list_floors).post(create_floor))
        .route(
            "/api/floors/{id}",
            get(get_floor).put(update_floor).delete(delete_floor),
        )
        .route("/api/apartments", get(list_apartments).post(create_apartment))
        .route(
            "/api/apartments/{id}",
            get(get_apartment).put(update_apartment).delete(delete_apartment),
        )
        .route("/api/residents", get(list_residents).post(create_resident))
        .route("/api/residents/{id}", get(get_resident).put(update_resident))
        .route("/api/residents/{id}/apartments", post(link_apartment))
        .route(
            "/api/residents/{id}/apartments/{apartment_id}",
            delete(unlink_apartment),
        )
}

// ===== Floors =====

async fn list_floors(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<Floor>>, AppError> {
    Ok(Json(FloorRepository::new(state.pool()).list().await?))
}

async fn get_floor(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
) -> Result<Json<Floor>, AppError> {
    FloorRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy tầng".to_string()))
}

async fn create_floor(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<FloorInput>,
) -> Result<(StatusCode, Json<Floor>), AppError> {
    let floor = FloorRepository::new(state.pool()).create(&input).await?;
    tracing::info!(floor_id = %floor.id, floor_number = floor.floor_number, by = %user.username, "Floor created");
    Ok((StatusCode::CREATED, Json(floor)))
}

async fn update_floor(
    RequireManager(_): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
    Json(input): Json<FloorInput>,
) -> Result<Json<Floor>, AppError> {
    Ok(Json(FloorRepository::new(state.pool()).update(id, &input).await?))
}

async fn delete_floor(
    RequireManager(_): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<FloorId>,
) -> Result<StatusCode, AppError> {
    FloorRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Apartments =====

async fn list_apartments(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<ApartmentFilter>,
) -> Result<Json<Page<Apartment>>, AppError> {
    Ok(Json(ApartmentRepository::new(state.pool()).list(&filter).await?))
}

async fn get_apartment(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
) -> Result<Json<Apartment>, AppError> {
    ApartmentRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy căn hộ".to_string()))
}

async fn create_apartment(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(input): Json<ApartmentInput>,
) -> Result<(StatusCode, Json<Apartment>), AppError> {
    let input = check_apartment(&state, input).await?;
    let apartment = ApartmentRepository::new(state.pool()).create(&input).await?;
    tracing::info!(apartment_id = %apartment.id, number = %apartment.number, by = %user.username, "Apartment created");
    Ok((StatusCode::CREATED, Json(apartment)))
}

async fn update_apartment(
    RequireManager(_): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
    Json(input): Json<ApartmentInput>,
) -> Result<Json<Apartment>, AppError> {
    let input = check_apartment(&state, input).await?;
    Ok(Json(ApartmentRepository::new(state.pool()).update(id, &input).await?))
}

async fn delete_apartment(
    RequireManager(_): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ApartmentId>,
) -> Result<StatusCode, AppError> {
    ApartmentRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn check_apartment(
    state: &AppState,
    input: ApartmentInput,
) -> Result<ApartmentInput, AppError> {
    let input = normalize_apartment(input)?;
    if FloorRepository::new(state.pool()).get(input.floor_id).await?.is_none() {
        return Err(AppError::BadRequest("Không tìm thấy tầng".to_string()));
    }
    Ok(input)
}

fn normalize_apartment(mut input: ApartmentInput) -> Result<ApartmentInput, AppError> {
    input.number = input.number.trim().to_uppercase();
    if input.number.is_empty() {
        return Err(AppError::BadRequest("Số căn hộ không được để trống".to_string()));
    }
    if input.area_m2.is_some_and(|area| area <= Decimal::ZERO) {
        return Err(AppError::BadRequest("Diện tích phải lớn hơn 0".to_string()));
    }
    if input.bedrooms.is_some_and(|n| n < 0) {
        return Err(AppError::BadRequest("Số phòng ngủ không hợp lệ".to_string()));
    }
    Ok(input)
}

// ===== Residents =====

async fn list_residents(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<ResidentFilter>,
) -> Result<Json<Page<Resident>>, AppError> {
    Ok(Json(ResidentRepository::new(state.pool()).list(&filter).await?))
}

async fn get_resident(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ResidentId>,
) -> Result<Json<Resident>, AppError> {
    ResidentRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy cư dân".to_string()))
}

async fn create_resident(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<ResidentInput>,
) -> Result<(StatusCode, Json<Resident>), AppError> {
    let input = normalize_resident(input)?;
    let resident = ResidentRepository::new(state.pool()).create(&input).await?;
    tracing::info!(resident_id = %resident.id, by = %user.username, "Resident created");
    Ok((StatusCode::CREATED, Json(resident)))
}

async fn update_resident(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ResidentId>,
    Json(input): Json<ResidentInput>,
) -> Result<Json<Resident>, AppError> {
    let input = normalize_resident(input)?;
    Ok(Json(ResidentRepository::new(state.pool()).update(id, &input).await?))
}

async fn link_apartment(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ResidentId>,
    Json(link): Json<ApartmentLinkInput>,
) -> Result<Json<Resident>, AppError> {
    if ApartmentRepository::new(state.pool()).get(link.apartment_id).await?.is_none() {
        return Err(AppError::BadRequest("Không tìm thấy căn hộ".to_string()));
    }
    let residents = ResidentRepository::new(state.pool());
    residents.link_apartment(id, &link, state.clock().today()).await?;
    residents
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy cư dân".to_string()))
}

async fn unlink_apartment(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path((id, apartment_id)): Path<(ResidentId, ApartmentId)>,
) -> Result<StatusCode, AppError> {
    ResidentRepository::new(state.pool())
        .unlink_apartment(id, apartment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Trim the name and validate the optional contact fields.
fn normalize_resident(mut input: ResidentInput) -> Result<ResidentInput, AppError> {
    input.full_name = input.full_name.trim().to_string();
    if input.full_name.is_empty() {
        return Err(AppError::BadRequest("Họ tên không được để trống".to_string()));
    }
    input.phone = match input.phone.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(phone) => Some(
            PhoneNumber::parse(phone)
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    input.email = match input.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(email) => Some(
            Email::parse(email)
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .into_inner(),
        ),
        None => None,
    };
    Ok(input)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sams_core::ApartmentStatus;

    use super::*;

    fn resident(name: &str, phone: Option<&str>, email: Option<&str>) -> ResidentInput {
        ResidentInput {
            user_id: None,
            full_name: name.to_string(),
            phone: phone.map(String::from),
            email: email.map(String::from),
            id_number: None,
            dob: None,
            gender: None,
            status: None,
        }
    }

    #[test]
    fn test_normalize_resident() {
        let input = normalize_resident(resident("  Nguyễn Văn A ", Some(" "), None)).unwrap();
        assert_eq!(input.full_name, "Nguyễn Văn A");
        assert_eq!(input.phone, None);

        assert!(normalize_resident(resident("   ", None, None)).is_err());
        assert!(normalize_resident(resident("A", None, Some("not-an-email"))).is_err());
    }

    #[test]
    fn test_normalize_apartment() {
        let input = ApartmentInput {
            floor_id: FloorId::new_v4(),
            number: " a1001 ".to_string(),
            area_m2: Some(Decimal::new(685, 1)),
            bedrooms: Some(2),
            apartment_type: None,
            status: ApartmentStatus::Active,
        };
        let normalized = normalize_apartment(input.clone()).unwrap();
        assert_eq!(normalized.number, "A1001");

        let mut zero_area = input;
        zero_area.area_m2 = Some(Decimal::ZERO);
        assert!(normalize_apartment(zero_area).is_err());
    }
}
