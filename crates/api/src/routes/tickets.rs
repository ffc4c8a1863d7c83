//! Service tickets, their comments and the finance documents raised for them.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use sams_core::{Page, TicketId};

use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireFinance, RequireStaff};
use crate::models::invoice::{Invoice, InvoiceWithDetails, TicketInvoiceInput};
use crate::models::ticket::{
    CommentInput, Ticket, TicketComment, TicketFilter, TicketInput, TicketStatusInput,
    TicketUpdateInput,
};
use crate::models::voucher::{TicketVoucherInput, VoucherWithItems};
use crate::services::{InvoiceService, TicketService, VoucherService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", get(list).post(create))
        .route("/api/tickets/{id}", get(show).put(update).delete(remove))
        .route("/api/tickets/{id}/status", patch(change_status))
        .route("/api/tickets/{id}/comments", get(comments).post(add_comment))
        .route(
            "/api/tickets/{id}/invoices",
            get(invoices).post(create_invoice),
        )
        .route("/api/tickets/{id}/vouchers", post(create_voucher))
}

/// Residents only see their own tickets.
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Page<Ticket>>, AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok(Json(service.list(filter, &user).await?))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<Ticket>, AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok(Json(service.get(id, &user).await?))
}

async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<TicketInput>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok((StatusCode::CREATED, Json(service.create(&input, &user).await?)))
}

async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(input): Json<TicketUpdateInput>,
) -> Result<Json<Ticket>, AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok(Json(service.update(id, &input, &user).await?))
}

async fn remove(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<StatusCode, AppError> {
    TicketService::new(state.pool(), state.clock()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(input): Json<TicketStatusInput>,
) -> Result<Json<Ticket>, AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok(Json(service.change_status(id, input.status, &user).await?))
}

async fn comments(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<Vec<TicketComment>>, AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    Ok(Json(service.comments(id, &user).await?))
}

async fn add_comment(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<TicketComment>), AppError> {
    let service = TicketService::new(state.pool(), state.clock());
    let comment = service.add_comment(id, &input.content, &user).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn invoices(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    TicketService::new(state.pool(), state.clock()).get(id, &user).await?;
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    Ok(Json(service.list_for_ticket(id).await?))
}

async fn create_invoice(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(input): Json<TicketInvoiceInput>,
) -> Result<(StatusCode, Json<InvoiceWithDetails>), AppError> {
    let service = InvoiceService::new(state.pool(), state.email(), state.clock());
    let invoice = service.create_from_ticket(id, &input, &user).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn create_voucher(
    RequireFinance(user): RequireFinance,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(input): Json<TicketVoucherInput>,
) -> Result<(StatusCode, Json<VoucherWithItems>), AppError> {
    let service = VoucherService::new(state.pool(), state.clock());
    let voucher = service.create_from_ticket(id, &input, &user).await?;
    Ok((StatusCode::CREATED, Json(voucher)))
}
