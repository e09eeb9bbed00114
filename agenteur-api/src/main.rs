//! # Agenteur API Server
//!
//! Serves the JSON API for accounts, sessions, organizations and
//! invitations on top of PostgreSQL.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/agenteur JWT_SECRET=... cargo run -p agenteur-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `RUST_LOG` to override the
//! default filter.

use std::{sync::Arc, time::Duration};

use agenteur_api::{
    app::{build_router, AppState},
    config::Config,
};
use agenteur_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool},
    },
    notifier::LogNotifier,
    store::postgres::PgStore,
};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// In-flight requests get this long after the listener stops accepting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Agenteur API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let address = config.bind_address();
    let state = AppState::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(LogNotifier),
        config,
    );
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    close_pool(pool).await;
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agenteur_api=debug,agenteur_shared=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM, then cancels outstanding request contexts
/// once the grace period runs out
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining requests...");

    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        info!("Grace period elapsed, cancelling in-flight requests");
        shutdown.cancel();
    });
}
