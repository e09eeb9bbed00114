/// Persisted entities and their SQL
///
/// Each model exposes associated functions taking `&mut PgConnection`, so the
/// same query runs on a pooled connection or inside a transaction. The
/// PostgreSQL store composes them; the in-memory store mirrors their
/// semantics.
///
/// # Models
///
/// - `user`: accounts and profile data
/// - `refresh_token`: hashed refresh tokens
/// - `organization`: organizations and slugs
/// - `membership`: user roles within organizations
/// - `invitation`: pending and accepted invitations

pub mod invitation;
pub mod membership;
pub mod organization;
pub mod refresh_token;
pub mod user;
