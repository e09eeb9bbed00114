/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. Core failures map through their
/// [`ErrorCategory`]; transport failures (bad JSON, bad ids, wrong content
/// type) have their own variants. All responses share one envelope:
///
/// ```json
/// { "error": { "code": "NOT_FOUND", "message": "Organization not found" } }
/// ```
///
/// Validation failures add a `details` object mapping field names to
/// messages.

use std::collections::BTreeMap;

use agenteur_shared::error::{CoreError, ErrorCategory};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

const FORBIDDEN_MESSAGE: &str = "You don't have permission to perform this action";
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Failure raised by a core operation
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Body is not valid JSON for the endpoint (400)
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    /// Path segment is not a UUID (400)
    #[error("Invalid {0} ID")]
    InvalidId(&'static str),

    /// Mutating request without a JSON content type (415)
    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    /// Request-shape validation failed (422)
    #[error("Validation failed: {} errors", .0.len())]
    Validation(BTreeMap<String, String>),

    /// Missing credential (401)
    #[error("Unauthorized")]
    Unauthorized,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ApiError {
    /// Status, code, message and details for the response
    fn parts(self) -> (StatusCode, &'static str, String, Option<BTreeMap<String, String>>) {
        match self {
            ApiError::Core(err) => core_parts(err),
            ApiError::InvalidJson(msg) => {
                tracing::debug!(error = %msg, "Rejected request body");
                (StatusCode::BAD_REQUEST, "INVALID_JSON", "Invalid JSON body".to_string(), None)
            }
            err @ ApiError::InvalidId(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_ID", err.to_string(), None)
            }
            err @ ApiError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                err.to_string(),
                None,
            ),
            ApiError::Validation(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(details),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
                None,
            ),
        }
    }
}

fn core_parts(err: CoreError) -> (StatusCode, &'static str, String, Option<BTreeMap<String, String>>) {
    let category = err.category();
    let code = category.code();

    match (category, err) {
        (_, CoreError::Validation { field, message }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            code,
            "Validation failed".to_string(),
            Some(BTreeMap::from([(field, message)])),
        ),
        (ErrorCategory::Validation, err) => (StatusCode::BAD_REQUEST, code, err.to_string(), None),
        (ErrorCategory::Conflict, err) => (StatusCode::CONFLICT, code, err.to_string(), None),
        (ErrorCategory::Unauthorized, err) => (StatusCode::UNAUTHORIZED, code, err.to_string(), None),
        (ErrorCategory::Forbidden, CoreError::Forbidden(reason)) => {
            tracing::debug!(reason = %reason, "Authorization denied");
            (StatusCode::FORBIDDEN, code, FORBIDDEN_MESSAGE.to_string(), None)
        }
        (ErrorCategory::Forbidden, err) => (StatusCode::FORBIDDEN, code, err.to_string(), None),
        (ErrorCategory::NotFound, err) => (StatusCode::NOT_FOUND, code, err.to_string(), None),
        (ErrorCategory::Cancelled, err) => {
            tracing::warn!("Request cancelled before completion");
            (StatusCode::SERVICE_UNAVAILABLE, code, err.to_string(), None)
        }
        (ErrorCategory::Internal, err) => {
            // Log internal errors but don't expose details to clients
            tracing::error!(error = %err, "Internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, code, INTERNAL_MESSAGE.to_string(), None)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();

        let body = Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

/// Converts derive-based request validation into field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errors)| {
                errors.first().map(|error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string());
                    (field.to_string(), message)
                })
            })
            .collect();
        ApiError::Validation(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenteur_shared::{auth::authorization::AuthzError, store::StoreError};
    use uuid::Uuid;

    fn status_and_code(err: impl Into<ApiError>) -> (StatusCode, &'static str) {
        let (status, code, _, _) = err.into().parts();
        (status, code)
    }

    #[test]
    fn test_core_category_mapping() {
        assert_eq!(
            status_and_code(CoreError::EmailExists),
            (StatusCode::CONFLICT, "CONFLICT")
        );
        assert_eq!(
            status_and_code(CoreError::InvalidCredentials),
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        );
        assert_eq!(
            status_and_code(CoreError::EmailMismatch),
            (StatusCode::FORBIDDEN, "FORBIDDEN")
        );
        assert_eq!(
            status_and_code(CoreError::InvitationNotFound),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_and_code(CoreError::LastAdmin),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
        assert_eq!(
            status_and_code(CoreError::Cancelled),
            (StatusCode::SERVICE_UNAVAILABLE, "REQUEST_CANCELLED")
        );
    }

    #[test]
    fn test_field_validation_carries_details() {
        let (status, code, message, details) =
            ApiError::from(CoreError::validation("password", "Too short")).parts();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
        assert_eq!(message, "Validation failed");
        let details = details.expect("Should include details");
        assert_eq!(details.get("password").map(String::as_str), Some("Too short"));
    }

    #[test]
    fn test_forbidden_hides_reason() {
        let (_, _, message, _) =
            ApiError::from(CoreError::Forbidden(AuthzError::NotMember(Uuid::new_v4()))).parts();
        assert_eq!(message, FORBIDDEN_MESSAGE);
    }

    #[test]
    fn test_internal_hides_details() {
        let err = CoreError::Store(StoreError::UniqueViolation("users_email_key".to_string()));
        let (status, code, message, _) = ApiError::from(err).parts();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert_eq!(message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_transport_errors() {
        assert_eq!(
            status_and_code(ApiError::InvalidJson("expected value".to_string())),
            (StatusCode::BAD_REQUEST, "INVALID_JSON")
        );
        assert_eq!(
            status_and_code(ApiError::InvalidId("organization")),
            (StatusCode::BAD_REQUEST, "INVALID_ID")
        );
        assert_eq!(
            status_and_code(ApiError::UnsupportedMediaType),
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
        );
        assert_eq!(ApiError::InvalidId("organization").to_string(), "Invalid organization ID");
    }
}
