//! User account commands.
//!
//! # Usage
//!
//! ```bash
//! # Bootstrap the first administrator
//! sams-cli user create -u admin -n "Quản trị viên" -r admin
//!
//! # Front desk account with contact details
//! sams-cli user create -u letan01 -n "Nguyễn Thị Lan" -r receptionist \
//!     -e lan@sams.vn -p 0912345678
//! ```
//!
//! The password is read from `SAMS_NEW_USER_PASSWORD` so it never lands in
//! shell history.

use sams_api::services::AuthService;
use sams_api::services::auth::UserSignup;
use sams_core::UserRole;

use super::{CommandError, connect};

/// Arguments for `user create`.
pub struct CreateUser<'a> {
    pub username: &'a str,
    pub full_name: &'a str,
    pub role: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Create a login account.
///
/// # Returns
///
/// The username as stored (trimmed).
pub async fn create(args: &CreateUser<'_>) -> Result<String, CommandError> {
    let role = parse_role(args.role)?;

    dotenvy::dotenv().ok();
    let password = std::env::var("SAMS_NEW_USER_PASSWORD")
        .map_err(|_| CommandError::MissingEnvVar("SAMS_NEW_USER_PASSWORD"))?;

    let pool = connect().await?;

    tracing::info!("Creating user: {} ({})", args.username, role);
    let user = AuthService::new(&pool)
        .create_user(&UserSignup {
            username: args.username,
            password: &password,
            full_name: args.full_name,
            email: args.email,
            phone: args.phone,
            role,
        })
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Role: {}",
        user.id,
        user.username,
        user.role
    );
    Ok(user.username)
}

fn parse_role(role: &str) -> Result<UserRole, CommandError> {
    role.parse().map_err(|_| {
        CommandError::InvalidArgument(format!(
            "Invalid role: {role}. Valid roles: admin, manager, accountant, receptionist, resident"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("admin").ok(), Some(UserRole::Admin));
        assert_eq!(parse_role(" Receptionist ").ok(), Some(UserRole::Receptionist));
        assert!(matches!(
            parse_role("super_admin"),
            Err(CommandError::InvalidArgument(_))
        ));
    }
}
