/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use agenteur_api::{app::{build_router, AppState}, config::Config};
/// use agenteur_shared::{db::pool::create_pool, notifier::LogNotifier, store::postgres::PgStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), Arc::new(LogNotifier), config);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, build_router(state)).await?;
/// # Ok(())
/// # }
/// ```

use std::{sync::Arc, time::Duration};

use agenteur_shared::{notifier::Notifier, services::Services, store::Store};
use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    middleware::{
        auth::{require_access, require_superadmin},
        content_type::require_json,
        security::SecurityHeadersLayer,
    },
    routes,
};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,

    /// Backing store, also probed by the health check
    pub store: Arc<dyn Store>,

    pub config: Arc<Config>,

    /// Cancelled after the shutdown grace period; every request context
    /// holds a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        let services = Services::new(
            store.clone(),
            notifier,
            config.token_codec(),
            config.session_settings(),
            config.invitation_settings(),
        );

        Self {
            services,
            store,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /api                                    (mutations must be JSON)
///     ├── POST /auth/signup | /auth/login | /auth/refresh | /auth/logout
///     ├── GET  /invitations/:token
///     ├── authenticated
///     │   ├── GET|PUT  /users/me
///     │   ├── GET|POST /organizations
///     │   ├── GET|PUT  /organizations/:id
///     │   ├── GET      /organizations/:id/members
///     │   ├── DELETE   /organizations/:id/members/:user_id
///     │   ├── POST     /organizations/:id/invitations
///     │   └── POST     /invitations/:token/accept
///     └── superadmin
///         ├── GET /admin/users
///         └── PUT /admin/users/:id/superadmin
/// ```
///
/// Outer layers, first to last: request id, tracing, request id
/// propagation, compression, CORS, security headers.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/invitations/:token", get(routes::invitations::get_invitation));

    let authenticated_routes = Router::new()
        .route(
            "/users/me",
            get(routes::users::get_me).put(routes::users::update_me),
        )
        .route(
            "/organizations",
            post(routes::organizations::create_organization)
                .get(routes::organizations::list_organizations),
        )
        .route(
            "/organizations/:id",
            get(routes::organizations::get_organization)
                .put(routes::organizations::update_organization),
        )
        .route(
            "/organizations/:id/members",
            get(routes::organizations::list_members),
        )
        .route(
            "/organizations/:id/members/:user_id",
            delete(routes::organizations::remove_member),
        )
        .route(
            "/organizations/:id/invitations",
            post(routes::invitations::create_invitation),
        )
        .route(
            "/invitations/:token/accept",
            post(routes::invitations::accept_invitation),
        )
        .route_layer(from_fn_with_state(state.clone(), require_access));

    let admin_routes = Router::new()
        .route("/admin/users", get(routes::admin::list_users))
        .route("/admin/users/:id/superadmin", put(routes::admin::set_superadmin))
        .route_layer(from_fn_with_state(state.clone(), require_superadmin))
        .route_layer(from_fn_with_state(state.clone(), require_access));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .layer(from_fn(require_json));

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.is_production()));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .fallback(routes::not_found)
        .layer(middleware)
        .with_state(state)
}

/// Permissive when `*` is configured; otherwise an explicit allow-list with
/// credentials so cookies can cross origins
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
