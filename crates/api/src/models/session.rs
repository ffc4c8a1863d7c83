//! Session-stored identity.

use serde::{Deserialize, Serialize};

use sams_core::{UserId, UserRole};

/// Session keys.
pub mod keys {
    pub const CURRENT_USER: &str = "current_user";
}

/// The signed-in user, as stored in the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Admin, manager or accountant.
    #[must_use]
    pub const fn is_finance(&self) -> bool {
        self.role.is_finance()
    }

    /// Admin or manager.
    #[must_use]
    pub const fn is_manager(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }
}
