/// Access token signing and validation
///
/// Access tokens are short-lived HS256 JWTs and are never persisted. The
/// verifier pins HS256, so `alg: none` or asymmetric-algorithm tokens are
/// rejected before the signature is considered.
///
/// # Claims
///
/// - `sub`: user ID
/// - `iat` / `exp`: issue and expiry timestamps (Unix seconds)
/// - `uid`: user ID (duplicated for clients that read custom claims only)
/// - `email`: user email at issue time
/// - `is_superadmin`: flag at issue time, informational only
///
/// # Example
///
/// ```
/// use agenteur_shared::auth::jwt::TokenCodec;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new("your-secret-key-at-least-32-bytes", Duration::minutes(15));
/// let user_id = Uuid::new_v4();
///
/// let token = codec.issue(user_id, "user@example.com", false)?;
/// let claims = codec.validate(&token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature, algorithm, format or claims are invalid
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// User ID
    pub uid: Uuid,

    /// Email at issue time
    pub email: String,

    /// Superadmin flag at issue time
    pub is_superadmin: bool,
}

impl AccessClaims {
    /// Builds claims expiring `ttl` from now
    pub fn new(user_id: Uuid, email: &str, is_superadmin: bool, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            uid: user_id,
            email: email.to_string(),
            is_superadmin,
        }
    }

    /// Checks if the claims have expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs and verifies access tokens with a shared HMAC secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec for `secret` issuing tokens valid for `ttl`
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Default lifetime of issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token with the codec's default lifetime
    pub fn issue(&self, user_id: Uuid, email: &str, is_superadmin: bool) -> Result<String, JwtError> {
        self.issue_with_ttl(user_id, email, is_superadmin, self.ttl)
    }

    /// Issues a token with an explicit lifetime
    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        is_superadmin: bool,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let claims = AccessClaims::new(user_id, email, is_superadmin, ttl);
        self.sign(&claims)
    }

    /// Signs arbitrary claims with HS256
    pub fn sign(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies signature, algorithm and expiry
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` if `exp` is in the past
    /// - `JwtError::Invalid` for any other failure
    pub fn validate(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.decode_with(token, true)
    }

    /// Verifies signature and algorithm but accepts expired tokens
    ///
    /// Only for identifying who is logging out. Never authorize with this.
    pub fn parse_ignoring_expiry(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.decode_with(token, false)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        let token_data = decode::<AccessClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            }
        })?;

        // Hand-crafted tokens could disagree; both fields must name the same user.
        if token_data.claims.sub != token_data.claims.uid {
            return Err(JwtError::Invalid("Subject and user ID differ".to_string()));
        }

        Ok(token_data.claims)
    }
}
