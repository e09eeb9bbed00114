/// Middleware modules for the API server
///
/// - `auth`: access-token authentication and the superadmin gate
/// - `content_type`: JSON-only mutating requests
/// - `security`: security response headers

pub mod auth;
pub mod content_type;
pub mod security;
