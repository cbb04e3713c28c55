//! Connection manager: owns the database pool and its retry state machine.
//!
//! State transitions:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!      ▲               │              │
//!      │               ▼              │ broken connection observed
//!      │            Failed ◄──┐       │
//!      │               │      │       │
//!      │   backoff     ▼      │       │
//!      │           Connecting─┘       │
//!      └──────────────────────────────┘
//! ```
//!
//! Reconnects after a failure are driven by [`ConnectionManager::supervise`],
//! a background task that sleeps through the backoff schedule. Request
//! handlers never sleep: [`ConnectionManager::ensure_connected`] makes at most
//! one bounded attempt and [`ConnectionManager::check_health`] never starts
//! one.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::schema::{self, Dialect};
use super::StoreError;

/// Where the manager currently stands with the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Ceiling for any single delay.
    pub max: Duration,
    /// Failures tolerated at startup before the outage is reported as an error.
    pub startup_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            startup_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after `failures` consecutive failed attempts.
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }
}

/// Per-operation time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Opening a pool and bootstrapping the schema.
    pub connect: Duration,
    /// A single store operation.
    pub query: Duration,
    /// The readiness ping.
    pub health: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            query: Duration::from_secs(5),
            health: Duration::from_secs(2),
        }
    }
}

/// Opens new pools on behalf of the [`ConnectionManager`].
pub trait Connector: Send + Sync + 'static {
    /// DDL dialect used to bootstrap the schema on each new pool.
    fn dialect(&self) -> Dialect;

    /// Open a pool with at least one live connection.
    fn connect(&self) -> BoxFuture<'_, Result<AnyPool, sqlx::Error>>;
}

/// Opens an [`AnyPool`] from a sqlx connection URL.
pub struct UrlConnector {
    url: String,
    dialect: Dialect,
    pool_size: u32,
    acquire_timeout: Duration,
    max_lifetime: Option<Duration>,
}

impl UrlConnector {
    pub fn new(url: impl Into<String>, dialect: Dialect, pool_size: u32, acquire_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            dialect,
            pool_size: pool_size.max(1),
            acquire_timeout,
            max_lifetime: None,
        }
    }

    /// Retire pooled connections older than `lifetime`.
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }
}

// The URL carries the password.
impl fmt::Debug for UrlConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlConnector")
            .field("dialect", &self.dialect)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .finish_non_exhaustive()
    }
}

impl Connector for UrlConnector {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn connect(&self) -> BoxFuture<'_, Result<AnyPool, sqlx::Error>> {
        Box::pin(async move {
            sqlx::any::install_default_drivers();
            AnyPoolOptions::new()
                .max_connections(self.pool_size)
                .acquire_timeout(self.acquire_timeout)
                .max_lifetime(self.max_lifetime)
                .connect(&self.url)
                .await
        })
    }
}

/// A clone of the live pool, tagged with the connection generation it came from.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    pool: AnyPool,
    generation: u64,
}

impl PoolHandle {
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Bumped on every successful (re)connect.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Slot {
    state: ConnectionState,
    pool: Option<AnyPool>,
    generation: u64,
    failures: u32,
    /// Completed connect attempts, successful or not.
    attempts: u64,
}

/// Owns the pool and the connection state machine.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    policy: BackoffPolicy,
    timeouts: Timeouts,
    slot: Mutex<Slot>,
    /// Serializes connect attempts so at most one pool is opened at a time.
    gate: tokio::sync::Mutex<()>,
    /// Wakes the supervisor when a live connection is lost.
    wake: Notify,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(connector: impl Connector, policy: BackoffPolicy, timeouts: Timeouts) -> Self {
        Self {
            connector: Box::new(connector),
            policy,
            timeouts,
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                pool: None,
                generation: 0,
                failures: 0,
                attempts: 0,
            }),
            gate: tokio::sync::Mutex::new(()),
            wake: Notify::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.slot().state
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn dialect(&self) -> Dialect {
        self.connector.dialect()
    }

    /// Consecutive failed connect attempts since the last success.
    pub fn failures(&self) -> u32 {
        self.slot().failures
    }

    /// Return the live pool, or make one bounded reconnect attempt.
    pub async fn ensure_connected(&self) -> Result<PoolHandle, StoreError> {
        if let Some(handle) = self.live() {
            return Ok(handle);
        }
        self.connect_once().await
    }

    /// Ping the live pool. Returns `false` without connecting when there is
    /// no live pool, leaving any in-progress backoff untouched.
    pub async fn check_health(&self) -> bool {
        let Some(handle) = self.live() else {
            return false;
        };
        match timeout(self.timeouts.health, sqlx::query("SELECT 1").execute(handle.pool())).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                self.mark_broken(handle.generation, &e.to_string());
                false
            }
            Err(_) => {
                self.mark_broken(handle.generation, "health check timed out");
                false
            }
        }
    }

    /// Run `op` against the live pool within the query timeout.
    ///
    /// Connectivity failures and timeouts tear down the pool and surface as
    /// [`StoreError::Unavailable`]; anything else is a [`StoreError::Database`].
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(AnyPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let handle = self.ensure_connected().await?;
        match timeout(self.timeouts.query, op(handle.pool.clone())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if is_connectivity_error(&e) => {
                let reason = e.to_string();
                self.mark_broken(handle.generation, &reason);
                Err(StoreError::Unavailable(reason))
            }
            Ok(Err(e)) => Err(StoreError::Database(e)),
            Err(_) => {
                self.mark_broken(handle.generation, "query timed out");
                Err(StoreError::Unavailable(format!(
                    "query timed out after {:?}",
                    self.timeouts.query
                )))
            }
        }
    }

    /// Drop the pool of `generation` and wake the supervisor.
    ///
    /// Reports against an older generation are ignored so a late failure from
    /// a previous pool cannot tear down a fresh one.
    pub fn mark_broken(&self, generation: u64, reason: &str) {
        let stale = {
            let mut slot = self.slot();
            if slot.generation != generation || slot.state != ConnectionState::Connected {
                return;
            }
            slot.state = ConnectionState::Disconnected;
            slot.pool.take()
        };
        warn!(generation, reason, "database connection lost; scheduling reconnect");
        if let Some(pool) = stale {
            tokio::spawn(async move { pool.close().await });
        }
        self.wake.notify_one();
    }

    /// Start [`Self::supervise`] on the tokio runtime.
    pub fn spawn_supervisor(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).supervise())
    }

    /// Background reconnect loop. Never returns.
    ///
    /// While disconnected it retries with exponential backoff; while connected
    /// it parks until [`Self::mark_broken`] wakes it.
    pub async fn supervise(self: Arc<Self>) {
        let mut starting = true;
        loop {
            if self.live().is_some() {
                starting = false;
                self.wake.notified().await;
                continue;
            }

            if self.connect_once().await.is_ok() {
                starting = false;
                continue;
            }

            let failures = self.failures();
            if starting && failures >= self.policy.startup_attempts {
                error!(
                    attempts = failures,
                    max_backoff = ?self.policy.max,
                    "database unreachable after startup attempts; retrying in background"
                );
                starting = false;
            }
            let delay = self.policy.delay_after(failures);
            debug!(?delay, failures, "next database connection attempt scheduled");
            tokio::time::sleep(delay).await;
        }
    }

    // ── private helpers ──────────────────────────────────────────────────────

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> Option<PoolHandle> {
        let slot = self.slot();
        match (slot.state, &slot.pool) {
            (ConnectionState::Connected, Some(pool)) => Some(PoolHandle {
                pool: pool.clone(),
                generation: slot.generation,
            }),
            _ => None,
        }
    }

    /// One connect attempt, bounded by a single `connect` deadline that covers
    /// both the wait for the gate and the attempt itself.
    ///
    /// A caller that queued behind an attempt which then failed reports
    /// unavailable instead of starting another one.
    async fn connect_once(&self) -> Result<PoolHandle, StoreError> {
        let deadline = Instant::now() + self.timeouts.connect;
        let seen = self.slot().attempts;

        let _gate = timeout_at(deadline, self.gate.lock()).await.map_err(|_| {
            StoreError::Unavailable("timed out waiting for in-flight connection attempt".to_owned())
        })?;

        // Another caller may have connected while we waited on the gate.
        if let Some(handle) = self.live() {
            return Ok(handle);
        }
        if self.slot().attempts != seen {
            return Err(StoreError::Unavailable(
                "connection attempt failed while waiting".to_owned(),
            ));
        }

        self.slot().state = ConnectionState::Connecting;
        debug!("opening database connection");

        let outcome = match timeout_at(deadline, self.open()).await {
            Ok(Ok(pool)) => Ok(pool),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connect timed out after {:?}", self.timeouts.connect)),
        };

        match outcome {
            Ok(pool) => {
                let (generation, previous_failures) = {
                    let mut slot = self.slot();
                    slot.attempts += 1;
                    slot.generation += 1;
                    slot.state = ConnectionState::Connected;
                    slot.pool = Some(pool.clone());
                    (slot.generation, std::mem::take(&mut slot.failures))
                };
                info!(generation, previous_failures, "database connected");
                Ok(PoolHandle { pool, generation })
            }
            Err(reason) => {
                let attempt = {
                    let mut slot = self.slot();
                    slot.attempts += 1;
                    slot.state = ConnectionState::Failed;
                    slot.failures = slot.failures.saturating_add(1);
                    slot.failures
                };
                warn!(attempt, error = %reason, "database connection attempt failed");
                Err(StoreError::Unavailable(reason))
            }
        }
    }

    async fn open(&self) -> Result<AnyPool, sqlx::Error> {
        let pool = self.connector.connect().await?;
        if let Err(e) = schema::bootstrap(&pool, self.connector.dialect()).await {
            pool.close().await;
            return Err(e);
        }
        Ok(pool)
    }
}

/// Errors that mean the connection itself is unusable, as opposed to the
/// database rejecting a statement.
pub fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
