/// Authentication endpoints
///
/// - `POST /api/auth/signup` - register and open a session (201)
/// - `POST /api/auth/login` - open a session
/// - `POST /api/auth/refresh` - rotate the refresh token
/// - `POST /api/auth/logout` - revoke every refresh token of the caller
///
/// Signup, login and refresh set both session cookies (`HttpOnly`,
/// `SameSite=Lax`, `Secure` outside local environments) and also return the
/// tokens in the body:
///
/// ```json
/// {
///   "data": {
///     "user": { "id": "uuid", "email": "alice@example.com", "firstName": "Alice", ... },
///     "accessToken": "eyJ...",
///     "accessTokenExpiresAt": "2026-01-01T00:15:00Z",
///     "refreshToken": "9f86d0...",
///     "refreshTokenExpiresAt": "2026-01-08T00:00:00Z"
///   }
/// }
/// ```

use agenteur_shared::{
    error::CoreError,
    services::session::{IssuedSession, SignupInput},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::AppendHeaders,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Ctx, JsonBody},
    middleware::auth::{access_token, cookie, ACCESS_COOKIE, REFRESH_COOKIE},
    response::{Envelope, MessageResponse},
    routes::users::UserResponse,
};

/// Path the refresh cookie is scoped to
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

type CookieHeaders = AppendHeaders<[(axum::http::HeaderName, HeaderValue); 2]>;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(max = 254, message = "Email must be at most 254 characters"))]
    pub email: String,

    #[validate(length(max = 1024, message = "Password must be at most 1024 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Session issued by signup, login and refresh
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

pub async fn signup(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    JsonBody(req): JsonBody<SignupRequest>,
) -> ApiResult<(StatusCode, CookieHeaders, Envelope<SessionResponse>)> {
    req.validate()?;

    let session = state
        .services
        .sessions
        .signup(
            &ctx,
            SignupInput {
                email: req.email,
                password: req.password,
                first_name: req.first_name,
                last_name: req.last_name,
            },
        )
        .await?;

    let (cookies, body) = session_response(&state, session)?;
    Ok((StatusCode::CREATED, cookies, body))
}

pub async fn login(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<(CookieHeaders, Envelope<SessionResponse>)> {
    let session = state
        .services
        .sessions
        .login(&ctx, &req.email, &req.password)
        .await?;

    session_response(&state, session)
}

/// Reads the refresh token from the cookie, falling back to the body
pub async fn refresh(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(CookieHeaders, Envelope<SessionResponse>)> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let req: RefreshRequest =
            serde_json::from_slice(&body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;
        req.refresh_token.filter(|t| !t.is_empty())
    };

    let raw = cookie(&headers, REFRESH_COOKIE)
        .or(from_body)
        .ok_or(CoreError::InvalidRefreshToken)?;

    let session = state.services.sessions.refresh(&ctx, &raw).await?;
    session_response(&state, session)
}

/// Accepts an expired but correctly signed access token
pub async fn logout(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    headers: HeaderMap,
) -> ApiResult<(CookieHeaders, Envelope<MessageResponse>)> {
    let token = access_token(&headers).ok_or(ApiError::Unauthorized)?;
    let claims = state.services.sessions.identify_for_logout(&token)?;

    state.services.sessions.logout(&ctx, claims.sub).await?;

    let secure = state.config.is_production();
    let cookies = AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE, "/", secure)?),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE, REFRESH_COOKIE_PATH, secure)?),
    ]);

    Ok((cookies, Envelope::new(MessageResponse::new("logged out"))))
}

fn session_response(
    state: &AppState,
    session: IssuedSession,
) -> ApiResult<(CookieHeaders, Envelope<SessionResponse>)> {
    let secure = state.config.is_production();
    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE,
                &session.access_token,
                "/",
                state.config.jwt.access_ttl_seconds,
                secure,
            )?,
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE,
                &session.refresh_token,
                REFRESH_COOKIE_PATH,
                state.config.jwt.refresh_ttl_seconds,
                secure,
            )?,
        ),
    ]);

    let body = SessionResponse {
        user: session.user.into(),
        access_token: session.access_token,
        access_token_expires_at: session.access_expires_at,
        refresh_token: session.refresh_token,
        refresh_token_expires_at: session.refresh_expires_at,
    };

    Ok((cookies, Envelope::new(body)))
}

/// Builds an `HttpOnly` session cookie
pub fn session_cookie(
    name: &str,
    value: &str,
    path: &str,
    max_age_seconds: i64,
    secure: bool,
) -> ApiResult<HeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path={path}; Max-Age={max_age_seconds}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| CoreError::Internal(format!("Invalid cookie header: {}", e)).into())
}

fn clear_cookie(name: &str, path: &str, secure: bool) -> ApiResult<HeaderValue> {
    session_cookie(name, "", path, 0, secure)
}
