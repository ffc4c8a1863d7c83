//! HTTP middleware for the API.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry (hub per request, HTTP transaction)
//! 2. CORS for the SPA origin, when configured
//! 3. `TraceLayer` span per request
//! 4. Request ID
//! 5. Sessions (`PostgreSQL` store)
//!
//! Role checks are extractors in [`auth`], not layers.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{
    AuthRejection, RequireAuth, RequireFinance, RequireManager, RequireStaff, clear_current_user,
    set_current_user,
};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
