//! board-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables (fatal on error).
//! 2. Initialise structured tracing (JSON or human-readable).
//! 3. Create the connection manager and start its reconnect supervisor.
//!    The database may still be down; the process serves `/health` anyway.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;
mod views;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::connection::{ConnectionManager, UrlConnector};
use crate::state::AppState;
use crate::views::Views;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info", false);
            error!(error = %e, "configuration invalid; refusing to start");
            return Err(e.into());
        }
    };

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg.log_level, cfg.log_json);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        app_name = %cfg.app_name,
        database = %cfg.database.display_url,
        "board-server starting"
    );

    // ── 3. Database connection manager ─────────────────────────────────────────
    let connector = UrlConnector::new(
        cfg.database.url.clone(),
        cfg.database.dialect,
        cfg.database.pool_size,
        // Pool acquisition shares the per-query budget.
        cfg.timeouts.query.max(Duration::from_millis(100)),
    )
    .with_max_lifetime(cfg.database.pool_recycle);
    let connections = Arc::new(ConnectionManager::new(connector, cfg.backoff, cfg.timeouts));
    let supervisor = connections.spawn_supervisor();

    // ── 4. Shared application state ────────────────────────────────────────────
    let hostname = state::local_hostname();
    let addr = cfg.bind_address;
    let state = Arc::new(AppState::new(cfg, connections, Views::new()?, hostname));

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, hostname = %state.hostname, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.abort();
    info!("board-server stopped");
    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level`; an unparsable filter falls back to
/// `info` with a warning on stderr.
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: BOARD_LOG='{log_level}' is not a valid tracing filter ({e}); \
                     falling back to 'info'"
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c    => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
