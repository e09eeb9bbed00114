/// PostgreSQL plumbing
///
/// - `pool`: connection pool creation, health check and shutdown
/// - `migrations`: embedded schema migrations

pub mod migrations;
pub mod pool;
