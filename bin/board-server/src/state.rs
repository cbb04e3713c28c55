//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::db::connection::ConnectionManager;
use crate::db::sql::SqlMessageStore;
use crate::views::Views;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Pool owner; answers readiness.
    pub connections: Arc<ConnectionManager>,
    /// Message persistence.
    pub store: Arc<SqlMessageStore>,
    /// Compiled page templates.
    pub views: Arc<Views>,
    /// Name of the serving host, shown on the page for load-balancer visibility.
    pub hostname: String,
}

impl AppState {
    pub fn new(
        config: Config,
        connections: Arc<ConnectionManager>,
        views: Views,
        hostname: String,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(SqlMessageStore::new(Arc::clone(&connections))),
            connections,
            views: Arc::new(views),
            hostname,
        }
    }
}

/// Host name reported by the operating system, or `"unknown"`.
pub fn local_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
impl AppState {
    /// State wired to `connections`, with configuration defaults.
    pub fn for_tests(connections: ConnectionManager) -> Self {
        let config = Config::from_lookup(|key| {
            (key == "BOARD_DATABASE_URL").then(|| "sqlite::memory:".to_owned())
        })
        .expect("test config");
        let views = Views::new().expect("templates compile");
        Self::new(config, Arc::new(connections), views, "test-host".to_owned())
    }
}
