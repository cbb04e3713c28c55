//! Test doubles for the connection layer.
//!
//! [`FlakySqlite`] opens real SQLite pools in a temporary directory and can be
//! switched off: while cut it refuses new connections, and [`Switch::sever`]
//! also closes every pool it handed out. [`Hang`] never finishes connecting.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tempfile::TempDir;

use super::connection::{BackoffPolicy, ConnectionManager, Connector, Timeouts};
use super::schema::Dialect;

pub struct FlakySqlite {
    url: String,
    reachable: Arc<AtomicBool>,
    opened: Arc<Mutex<Vec<AnyPool>>>,
}

/// Remote control for a [`FlakySqlite`].
#[derive(Clone)]
pub struct Switch {
    reachable: Arc<AtomicBool>,
    opened: Arc<Mutex<Vec<AnyPool>>>,
}

impl FlakySqlite {
    /// A reachable connector backed by a fresh database file.
    ///
    /// The returned [`TempDir`] must outlive every pool.
    pub fn new() -> (Self, Switch, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("board.db").display());
        let reachable = Arc::new(AtomicBool::new(true));
        let opened = Arc::new(Mutex::new(Vec::new()));
        let switch = Switch {
            reachable: Arc::clone(&reachable),
            opened: Arc::clone(&opened),
        };
        (Self { url, reachable, opened }, switch, dir)
    }
}

impl Connector for FlakySqlite {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn connect(&self) -> BoxFuture<'_, Result<AnyPool, sqlx::Error>> {
        Box::pin(async move {
            if !self.reachable.load(Ordering::SeqCst) {
                return Err(sqlx::Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "database unreachable",
                )));
            }
            sqlx::any::install_default_drivers();
            let pool = AnyPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(2))
                .connect(&self.url)
                .await?;
            self.opened.lock().expect("opened pools").push(pool.clone());
            Ok(pool)
        })
    }
}

impl Switch {
    /// Refuse new connections.
    pub fn cut(&self) {
        self.reachable.store(false, Ordering::SeqCst);
    }

    /// Refuse new connections and close every pool opened so far.
    pub async fn sever(&self) {
        self.cut();
        let pools: Vec<AnyPool> = self.opened.lock().expect("opened pools").drain(..).collect();
        for pool in pools {
            pool.close().await;
        }
    }

    pub fn restore(&self) {
        self.reachable.store(true, Ordering::SeqCst);
    }
}

/// A connector whose connect attempts never complete.
pub struct Hang;

impl Connector for Hang {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn connect(&self) -> BoxFuture<'_, Result<AnyPool, sqlx::Error>> {
        Box::pin(futures::future::pending())
    }
}

/// Millisecond-scale backoff with three startup attempts.
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(50),
        startup_attempts: 3,
    }
}

/// A manager with [`fast_backoff`] and short timeouts.
pub fn fast_manager(connector: impl Connector) -> ConnectionManager {
    ConnectionManager::new(
        connector,
        fast_backoff(),
        Timeouts {
            connect: Duration::from_secs(2),
            query: Duration::from_secs(2),
            health: Duration::from_millis(500),
        },
    )
}
