/// API route handlers
///
/// - `health`: health check
/// - `auth`: signup, login, refresh, logout
/// - `users`: own profile
/// - `organizations`: organizations and their members
/// - `invitations`: invite, look up, accept
/// - `admin`: superadmin user directory

pub mod admin;
pub mod auth;
pub mod health;
pub mod invitations;
pub mod organizations;
pub mod users;

use agenteur_shared::error::CoreError;

use crate::error::ApiError;

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    CoreError::NotFound("Route").into()
}
