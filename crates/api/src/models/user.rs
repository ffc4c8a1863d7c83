//! Login accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{Email, UserId, UserRole};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new account; the password is hashed before it reaches the repository.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub full_name: String,
    pub role: UserRole,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}
