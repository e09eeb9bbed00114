/// Refresh token records
///
/// Only the SHA-256 digest of a refresh token is persisted. Redeeming a
/// token deletes its row with `DELETE ... RETURNING`, so concurrent
/// redemptions of the same token see at most one row between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

pub const TOKEN_HASH_UNIQUE_CONSTRAINT: &str = "refresh_tokens_token_hash_key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub async fn create(conn: &mut PgConnection, data: CreateRefreshToken) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.token_hash)
        .bind(data.expires_at)
        .fetch_one(conn)
        .await
    }

    /// Deletes the token with `token_hash` and returns it
    ///
    /// Expired rows are returned too; the caller decides.
    pub async fn take(conn: &mut PgConnection, token_hash: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await
    }

    /// Deletes every refresh token of a user
    pub async fn delete_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "h".to_string(),
            expires_at: now,
            created_at: now - Duration::days(7),
        };

        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }
}
