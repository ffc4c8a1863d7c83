//! Amenity bookings.
//!
//! Residents create and cancel their own bookings; staff confirm, complete
//! and record payment.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use sams_core::{BookingId, Page};

use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::amenity::{
    Booking, BookingFilter, BookingInput, BookingQuote, BookingUpdateInput, CancelInput,
    PaymentStatusInput, QuoteQuery,
};
use crate::services::BookingService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", get(list).post(create))
        .route("/api/bookings/my", get(mine))
        .route("/api/bookings/quote", get(quote))
        .route("/api/bookings/{id}", get(show).put(update))
        .route("/api/bookings/{id}/cancel", post(cancel))
        .route("/api/bookings/{id}/confirm", post(confirm))
        .route("/api/bookings/{id}/complete", post(complete))
        .route("/api/bookings/{id}/payment-status", post(payment_status))
}

fn service(state: &AppState) -> BookingService<'_> {
    BookingService::new(state.pool(), state.email(), state.clock())
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(service(&state).list(&filter).await?))
}

async fn mine(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(service(&state).list_mine(filter, &user).await?))
}

/// Price and dates for a package if booked today.
async fn quote(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<BookingQuote>, AppError> {
    Ok(Json(service(&state).quote(query.package_id).await?))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(service(&state).get(id, &user).await?))
}

async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<BookingInput>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = service(&state).create(&input, &user).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(input): Json<BookingUpdateInput>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(service(&state).update(id, &input, &user).await?))
}

async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    body: Option<Json<CancelInput>>,
) -> Result<Json<Booking>, AppError> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let booking = service(&state)
        .cancel(id, input.reason.as_deref(), &user)
        .await?;
    Ok(Json(booking))
}

async fn confirm(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(service(&state).confirm(id, &user).await?))
}

async fn complete(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(service(&state).complete(id, &user).await?))
}

async fn payment_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(input): Json<PaymentStatusInput>,
) -> Result<Json<Booking>, AppError> {
    let booking = service(&state)
        .set_payment_status(id, input.payment_status, &user)
        .await?;
    Ok(Json(booking))
}
