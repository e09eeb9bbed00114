/// Credential transport and authentication middleware
///
/// Access tokens arrive in the `access_token` cookie or an
/// `Authorization: Bearer` header; the header wins when both are present.
/// [`require_access`] validates the token and inserts a [`Principal`] into
/// the request extensions. [`require_superadmin`] runs after it and checks
/// the superadmin flag in storage, never the token claim.

use agenteur_shared::auth::jwt::AccessClaims;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Ctx,
};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

impl From<AccessClaims> for Principal {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Requires a valid, unexpired access token
pub async fn require_access(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = access_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let claims = state.services.sessions.authenticate(&token)?;

    req.extensions_mut().insert(Principal::from(claims));
    Ok(next.run(req).await)
}

/// Requires the stored superadmin flag; layer inside [`require_access`]
pub async fn require_superadmin(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    state
        .services
        .authorizer
        .require_superadmin(&ctx, principal.user_id)
        .await?;

    Ok(next.run(req).await)
}

/// Access token from the bearer header or the cookie
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie(headers, ACCESS_COOKIE))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Reads a cookie by name across every `Cookie` header
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
