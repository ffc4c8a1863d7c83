//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready
//!
//! # Auth
//! POST /api/auth/login | /api/auth/logout,  GET /api/auth/me
//!
//! # Building
//! /api/floors[/{id}]
//! /api/apartments[/{id}]
//! /api/residents[/{id}],  /api/residents/{id}/apartments[/{apartment_id}]
//!
//! # Service requests
//! /api/tickets[/{id}]
//! PATCH /api/tickets/{id}/status
//! /api/tickets/{id}/comments | /invoices | /vouchers
//!
//! # Finance
//! /api/invoices[/{id}],  PATCH /{id}/status,  POST /{id}/details
//! POST /api/invoices/generate-monthly
//! /api/invoice-configuration,  /api/service-types[/{id}]
//! /api/service-types/{id}/prices,  GET /api/service-types/{id}/current-price
//! /api/service-prices/{id}
//! /api/receipts[/{id}],  GET /api/invoices/{id}/receipt
//! /api/vouchers[/{id}],  PATCH /{id}/status
//!
//! # Amenities
//! /api/amenities[/{id}],  /api/amenities/{id}/packages[/{package_id}]
//! /api/bookings[/{id}],  GET /my | /quote
//! POST /api/bookings/{id}/cancel | /confirm | /complete | /payment-status
//!
//! # Assets
//! /api/assets[/{id}]
//! /api/vehicles[/{id}],  PATCH /{id}/status
//! /api/maintenance-schedules[/{id}],  PATCH /{id}/status
//!
//! # Access, documents, announcements
//! /api/access-cards[/{id}],  GET /{id}/history
//! /api/documents[/{id}],  POST /{id}/versions,  PATCH /{id}/status,  GET /{id}/logs
//! /api/announcements[/{id}],  GET /active
//! ```

pub mod access_cards;
pub mod amenities;
pub mod announcements;
pub mod auth;
pub mod bookings;
pub mod building;
pub mod documents;
pub mod health;
pub mod invoices;
pub mod maintenance;
pub mod receipts;
pub mod service_prices;
pub mod tickets;
pub mod vehicles;
pub mod vouchers;

use axum::Router;

use crate::state::AppState;

/// Build the full router (without layers or state).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(building::router())
        .merge(tickets::router())
        .merge(invoices::router())
        .merge(service_prices::router())
        .merge(receipts::router())
        .merge(vouchers::router())
        .merge(amenities::router())
        .merge(bookings::router())
        .merge(maintenance::router())
        .merge(vehicles::router())
        .merge(access_cards::router())
        .merge(documents::router())
        .merge(announcements::router())
}
