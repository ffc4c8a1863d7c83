//! Authentication extractors.
//!
//! Every extractor reads the [`CurrentUser`] stored in the session at login.
//! Unauthenticated requests get 401; authenticated users without the
//! required role get 403. Both respond with the same `{"error": ...}` body
//! as [`crate::error::AppError`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::session::{CurrentUser, keys};

/// Any signed-in user, resident or staff.
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Admin, manager, receptionist or accountant.
pub struct RequireStaff(pub CurrentUser);

/// Admin, manager or accountant.
pub struct RequireFinance(pub CurrentUser);

/// Admin or manager.
pub struct RequireManager(pub CurrentUser);

/// Error returned when a guard rejects the request.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Not signed in (or the session could not be read).
    Unauthorized,
    /// Signed in without the required role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Vui lòng đăng nhập"),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Bạn không có quyền thực hiện thao tác này",
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn session_user(parts: &Parts) -> Result<CurrentUser, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or(AuthRejection::Unauthorized)
}

async fn user_with(
    parts: &Parts,
    allowed: fn(&CurrentUser) -> bool,
) -> Result<CurrentUser, AuthRejection> {
    let user = session_user(parts).await?;
    if !allowed(&user) {
        tracing::warn!(user = %user.username, role = %user.role, path = %parts.uri.path(), "Role check failed");
        return Err(AuthRejection::Forbidden);
    }
    Ok(user)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_with(parts, CurrentUser::is_staff).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireFinance
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_with(parts, CurrentUser::is_finance).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireManager
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_with(parts, CurrentUser::is_manager).await.map(Self)
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    // New ID on login prevents session fixation
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Drop the session entirely (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[tokio::test]
    async fn test_rejection_bodies() {
        let response = AuthRejection::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthRejection::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("không có quyền"));
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let (parts, ()) = axum::http::Request::builder()
            .uri("/api/tickets")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_user(&parts).await.unwrap_err(), AuthRejection::Unauthorized);
    }
}
