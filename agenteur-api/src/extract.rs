/// Request extractors
///
/// - [`JsonBody`]: JSON body with errors in the API envelope
/// - [`Ctx`]: per-request [`RequestContext`] carrying the request id, the
///   shutdown cancellation token and the configured deadline
/// - [`parse_id`]: path segment to UUID with `INVALID_ID` on failure

use std::convert::Infallible;

use agenteur_shared::context::RequestContext;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tower_http::request_id::RequestId;
use uuid::Uuid;

use crate::{app::AppState, error::ApiError};

/// JSON request body
///
/// Malformed bodies are rejected with `INVALID_JSON`, a missing JSON
/// content type with 415.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(JsonRejection::MissingJsonContentType(_)) => Err(ApiError::UnsupportedMediaType),
            Err(rejection) => Err(ApiError::InvalidJson(rejection.body_text())),
        }
    }
}

/// Execution context for core operations
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let ctx = RequestContext::new(request_id)
            .with_cancellation(state.shutdown.child_token())
            .with_timeout(state.config.request_timeout());

        Ok(Ctx(ctx))
    }
}

/// Parses a path id, naming the resource in the error
pub fn parse_id(raw: &str, resource: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidId(resource))
}
