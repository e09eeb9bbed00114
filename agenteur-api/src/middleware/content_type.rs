/// JSON content-type enforcement
///
/// Mutating requests (`POST`, `PUT`, `PATCH`, `DELETE`) under `/api` must
/// declare `application/json`. HTML forms cannot send that content type, so
/// cross-site form posts are rejected before reaching a handler.

use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, Method},
    middleware::Next,
    response::Response,
};

use crate::error::{ApiError, ApiResult};

pub async fn require_json(req: Request, next: Next) -> ApiResult<Response> {
    if is_mutating(req.method()) && !is_json(&req) {
        return Err(ApiError::UnsupportedMediaType);
    }
    Ok(next.run(req).await)
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/thing", post(|| async { "created" }))
            .route("/read", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(require_json))
    }

    #[tokio::test]
    async fn test_rejects_form_post() {
        let response = app()
            .oneshot(
                http::Request::post("/thing")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::empty())
                    .expect("Should build request"),
            )
            .await
            .expect("Should respond");

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_allows_json_and_reads() {
        let response = app()
            .oneshot(
                http::Request::post("/thing")
                    .header(CONTENT_TYPE, "application/json; charset=utf-8")
                    .body(Body::empty())
                    .expect("Should build request"),
            )
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(http::Request::get("/read").body(Body::empty()).expect("Should build request"))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
