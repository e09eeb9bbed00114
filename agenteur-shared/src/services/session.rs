/// Signup, login, refresh rotation and logout
///
/// A session is an access token (stateless JWT) plus a refresh token (opaque,
/// hashed in storage, single use). Every refresh consumes the presented token
/// with `take_refresh_token` and inserts its replacement in the same
/// transaction, so a token can be redeemed at most once even under
/// concurrent requests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::{AccessClaims, TokenCodec},
        password::{hash_password, verify_password, HashCost},
        token::{hash_token, OpaqueToken},
    },
    context::RequestContext,
    error::{CoreError, CoreResult},
    models::{
        refresh_token::CreateRefreshToken,
        user::{normalize_email, CreateUser, User, EMAIL_UNIQUE_CONSTRAINT},
    },
    store::{RefreshTokenRepository, Store, StoreTx, UserRepository},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub refresh_ttl: Duration,
    pub hash_cost: HashCost,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_ttl: Duration::days(7),
            hash_cost: HashCost::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Credentials handed back after signup, login or refresh
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,

    /// Raw refresh token; only its hash is stored
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    codec: TokenCodec,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, codec: TokenCodec, settings: SessionSettings) -> Self {
        Self { store, codec, settings }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Registers a user and opens a session
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` for a malformed email, short password or missing first name
    /// - `CoreError::EmailExists` if the email is registered, in any letter case
    pub async fn signup(&self, ctx: &RequestContext, input: SignupInput) -> CoreResult<IssuedSession> {
        ctx.run(async {
            let email = normalize_email(&input.email);
            validate_signup(&email, &input)?;

            let password_hash = hash_blocking(input.password, self.settings.hash_cost).await?;

            let mut tx = self.store.begin().await?;
            if tx.user_by_email(&email).await?.is_some() {
                return Err(CoreError::EmailExists);
            }

            let user = tx
                .insert_user(CreateUser {
                    email,
                    password_hash,
                    first_name: input.first_name.trim().to_string(),
                    last_name: input.last_name.trim().to_string(),
                })
                .await
                .map_err(|e| {
                    if e.is_unique_violation(EMAIL_UNIQUE_CONSTRAINT) {
                        CoreError::EmailExists
                    } else {
                        e.into()
                    }
                })?;

            let session = self.issue(tx.as_mut(), user).await?;
            tx.commit().await?;

            info!(request_id = %ctx.request_id(), user_id = %session.user.id, "User signed up");
            Ok(session)
        })
        .await
    }

    /// Verifies credentials and opens a session
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, ctx: &RequestContext, email: &str, password: &str) -> CoreResult<IssuedSession> {
        ctx.run(async {
            let email = normalize_email(email);

            let mut tx = self.store.begin().await?;
            let user = tx.user_by_email(&email).await?;
            drop(tx);

            let Some(user) = user else {
                warn!(request_id = %ctx.request_id(), "Login failed: unknown email");
                return Err(CoreError::InvalidCredentials);
            };

            if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
                warn!(request_id = %ctx.request_id(), user_id = %user.id, "Login failed: wrong password");
                return Err(CoreError::InvalidCredentials);
            }

            let mut tx = self.store.begin().await?;
            let session = self.issue(tx.as_mut(), user).await?;
            tx.commit().await?;

            info!(request_id = %ctx.request_id(), user_id = %session.user.id, "User logged in");
            Ok(session)
        })
        .await
    }

    /// Consumes a refresh token and issues a new pair
    ///
    /// # Errors
    ///
    /// `CoreError::InvalidRefreshToken` if the token is unknown, already
    /// consumed, expired, or its user is gone.
    pub async fn refresh(&self, ctx: &RequestContext, raw_token: &str) -> CoreResult<IssuedSession> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;

            let Some(token) = tx.take_refresh_token(&hash_token(raw_token)).await? else {
                warn!(request_id = %ctx.request_id(), "Refresh with unknown or reused token");
                return Err(CoreError::InvalidRefreshToken);
            };

            if token.is_expired(Utc::now()) {
                // Keep the deletion of the stale row.
                tx.commit().await?;
                return Err(CoreError::InvalidRefreshToken);
            }

            let user = tx
                .user_by_id(token.user_id)
                .await?
                .ok_or(CoreError::InvalidRefreshToken)?;

            let session = self.issue(tx.as_mut(), user).await?;
            tx.commit().await?;

            info!(request_id = %ctx.request_id(), user_id = %session.user.id, "Session refreshed");
            Ok(session)
        })
        .await
    }

    /// Revokes every refresh token of the user
    pub async fn logout(&self, ctx: &RequestContext, user_id: Uuid) -> CoreResult<u64> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let revoked = tx.delete_refresh_tokens_for_user(user_id).await?;
            tx.commit().await?;

            info!(request_id = %ctx.request_id(), user_id = %user_id, revoked, "User logged out");
            Ok(revoked)
        })
        .await
    }

    /// Validates an access token
    pub fn authenticate(&self, token: &str) -> CoreResult<AccessClaims> {
        self.codec.validate(token).map_err(|_| CoreError::InvalidToken)
    }

    /// Identifies the caller of logout; expiry is not checked
    pub fn identify_for_logout(&self, token: &str) -> CoreResult<AccessClaims> {
        self.codec
            .parse_ignoring_expiry(token)
            .map_err(|_| CoreError::InvalidToken)
    }

    async fn issue(&self, tx: &mut dyn StoreTx, user: User) -> CoreResult<IssuedSession> {
        let refresh = OpaqueToken::generate();
        let now = Utc::now();
        let refresh_expires_at = now + self.settings.refresh_ttl;

        tx.insert_refresh_token(CreateRefreshToken {
            user_id: user.id,
            token_hash: refresh.hash,
            expires_at: refresh_expires_at,
        })
        .await?;

        let access_token = self
            .codec
            .issue(user.id, &user.email, user.is_superadmin)
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        Ok(IssuedSession {
            user,
            access_token,
            access_expires_at: now + self.codec.ttl(),
            refresh_token: refresh.raw,
            refresh_expires_at,
        })
    }
}

fn validate_signup(email: &str, input: &SignupInput) -> CoreResult<()> {
    if !looks_like_email(email) {
        return Err(CoreError::validation("email", "Valid email is required"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreError::validation(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if input.first_name.trim().is_empty() {
        return Err(CoreError::validation("firstName", "First name is required"));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

async fn hash_blocking(password: String, cost: HashCost) -> CoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, &cost))
        .await
        .map_err(|e| CoreError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(CoreError::from)
}

async fn verify_blocking(password: String, hash: String) -> CoreResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| CoreError::Internal(format!("Verification task failed: {}", e)))?
        .map_err(CoreError::from)
}
