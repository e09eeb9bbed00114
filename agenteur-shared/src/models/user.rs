/// User model and database operations
///
/// Users are global; organization access comes from memberships.
/// Emails are stored trimmed and lowercased, and the unique index on
/// `lower(email)` rejects case variants.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL,
///     password_hash TEXT NOT NULL,
///     first_name TEXT NOT NULL,
///     last_name TEXT NOT NULL DEFAULT '',
///     is_superadmin BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX users_email_key ON users (lower(email));
/// ```
///
/// # Example
///
/// ```no_run
/// use agenteur_shared::models::user::{CreateUser, User};
/// use agenteur_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let mut conn = pool.acquire().await?;
///
/// let user = User::create(&mut conn, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "Jane".to_string(),
///     last_name: "Doe".to_string(),
/// }).await?;
///
/// let found = User::find_by_email(&mut conn, "user@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Unique index guarding case-insensitive email uniqueness
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Lowercased email address
    pub email: String,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,

    /// Global administrator flag
    ///
    /// Authoritative only when read from storage.
    pub is_superadmin: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", or the email when both names are blank
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.email)
    }
}

/// Formats a display name with the email as fallback
pub fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let name = format!("{} {}", first_name, last_name);
    let name = name.trim();
    if name.is_empty() {
        email.to_string()
    } else {
        name.to_string()
    }
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Already normalized email
    pub email: String,

    /// Argon2id hash, not the plaintext password
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub first_name: String,
    pub last_name: String,
}

/// Paging and search for the user directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    /// 1-based page number
    pub page: i64,

    pub per_page: i64,

    /// Case-insensitive substring matched against email and names
    pub search: Option<String>,
}

impl UserQuery {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 100;

    /// Builds a query, replacing out-of-range values with defaults
    pub fn new(page: Option<i64>, per_page: Option<i64>, search: Option<String>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let per_page = per_page
            .filter(|p| (1..=Self::MAX_PER_PAGE).contains(p))
            .unwrap_or(Self::DEFAULT_PER_PAGE);
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self { page, per_page, search }
    }

    /// Rows to skip; saturates instead of overflowing on huge page numbers
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// In-process equivalent of the SQL search predicate
    pub fn matches(&self, user: &User) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                user.email.to_lowercase().contains(&term)
                    || user.first_name.to_lowercase().contains(&term)
                    || user.last_name.to_lowercase().contains(&term)
            }
        }
    }
}

impl Default for UserQuery {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// Unique violation on `users_email_key` when the email is taken.
    pub async fn create(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, first_name, last_name,
                      is_superadmin, created_at, updated_at
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name,
                   is_superadmin, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name,
                   is_superadmin, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await
    }

    /// Replaces first and last name
    pub async fn update_profile(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, first_name, last_name,
                      is_superadmin, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.first_name)
        .bind(data.last_name)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_superadmin(
        conn: &mut PgConnection,
        id: Uuid,
        is_superadmin: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_superadmin = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, first_name, last_name,
                      is_superadmin, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(is_superadmin)
        .fetch_optional(conn)
        .await
    }

    /// Lists one page of users, newest first, with the total match count
    pub async fn list(conn: &mut PgConnection, query: &UserQuery) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = query.search.as_ref().map(|s| format!("%{}%", escape_like(s)));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE $1::TEXT IS NULL
               OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name,
                   is_superadmin, created_at, updated_at
            FROM users
            WHERE $1::TEXT IS NULL
               OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(query.per_page)
        .bind(query.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok((users, total))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
