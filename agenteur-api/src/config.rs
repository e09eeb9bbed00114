/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `ENV`: deployment environment (default: local); anything else enables
///   secure cookies and HSTS
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: HMAC secret for access tokens (required, at least 32 chars)
/// - `ACCESS_TOKEN_TTL_SECONDS` / `REFRESH_TOKEN_TTL_SECONDS`: session lifetimes
/// - `INVITE_TOKEN_TTL_SECONDS` / `INVITE_BASE_URL`: invitation links
/// - `PASSWORD_HASH_MEMORY_KIB` / `PASSWORD_HASH_ITERATIONS` /
///   `PASSWORD_HASH_PARALLELISM`: Argon2id cost
/// - `CORS_ALLOWED_ORIGINS`: comma-separated origin list
/// - `REQUEST_TIMEOUT_SECONDS`: deadline for each core operation (default: 30)
/// - `RUST_LOG` / `LOG_FORMAT`: read by `main`, not here
///
/// # Example
///
/// ```no_run
/// use agenteur_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::{env, fmt::Display, str::FromStr, time::Duration};

use agenteur_shared::{
    auth::{jwt::TokenCodec, password::HashCost},
    db::pool::DatabaseConfig,
    services::{invitations::InvitationSettings, session::SessionSettings},
};

pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub invitations: InvitationConfig,
    pub password: HashCost,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Deployment environment name, `local` during development
    pub env: String,

    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    pub request_timeout_seconds: u64,
}

/// Token configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct InvitationConfig {
    pub ttl_seconds: i64,
    pub base_url: String,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// A `.env` file is read first when present.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let access_ttl_seconds: i64 = parse_or(&lookup, "ACCESS_TOKEN_TTL_SECONDS", 900)?;
        let refresh_ttl_seconds: i64 = parse_or(&lookup, "REFRESH_TOKEN_TTL_SECONDS", 604_800)?;
        let invite_ttl_seconds: i64 = parse_or(&lookup, "INVITE_TOKEN_TTL_SECONDS", 604_800)?;
        for (name, value) in [
            ("ACCESS_TOKEN_TTL_SECONDS", access_ttl_seconds),
            ("REFRESH_TOKEN_TTL_SECONDS", refresh_ttl_seconds),
            ("INVITE_TOKEN_TTL_SECONDS", invite_ttl_seconds),
        ] {
            if value <= 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }

        let request_timeout_seconds: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        if request_timeout_seconds == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECONDS must be positive");
        }

        let defaults = HashCost::default();
        let password = HashCost {
            memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            api: ApiConfig {
                env: lookup("ENV").unwrap_or_else(|| "local".to_string()),
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                cors_origins: parse_csv(&lookup("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
                request_timeout_seconds,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                ..DatabaseConfig::default()
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds,
                refresh_ttl_seconds,
            },
            invitations: InvitationConfig {
                ttl_seconds: invite_ttl_seconds,
                base_url: lookup("INVITE_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:5173/invitations".to_string()),
            },
            password,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True outside local development: cookies get `Secure`, responses get HSTS
    pub fn is_production(&self) -> bool {
        self.api.env != "local"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_seconds)
    }

    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(
            &self.jwt.secret,
            chrono::Duration::seconds(self.jwt.access_ttl_seconds),
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            refresh_ttl: chrono::Duration::seconds(self.jwt.refresh_ttl_seconds),
            hash_cost: self.password,
        }
    }

    pub fn invitation_settings(&self) -> InvitationSettings {
        InvitationSettings {
            ttl: chrono::Duration::seconds(self.invitations.ttl_seconds),
            base_url: self.invitations.base_url.clone(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

/// Splits a comma-separated list, trimming entries and dropping empties
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
