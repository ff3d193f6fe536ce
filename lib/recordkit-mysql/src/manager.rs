//! Pooled MySQL connection manager.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use recordkit::{
    ConnectionPool, DatabaseConfig, ExecResult, OrmError, PoolStats, QueryExecutor, Result, Row,
    Value,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, MySql};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::MySqlConnection;
use crate::row;

/// Lifecycle of a [`ConnectionManager`].
///
/// A failed `connect()` returns an error and leaves the state where it was
/// before the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Closed,
}

struct Slot {
    state: ConnectionState,
    pool: Option<MySqlPool>,
}

/// Owns the connection pool for one database.
///
/// Created unconnected by [`new`](Self::new); [`connect`](Self::connect)
/// builds and verifies the pool. Once connected the manager never reconnects
/// on its own: a query failure is returned to the caller as is.
pub struct ConnectionManager {
    config: DatabaseConfig,
    slot: RwLock<Slot>,
    connect_lock: Mutex<()>,
    queued: AtomicU32,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(Slot {
                state: ConnectionState::Uninitialized,
                pool: None,
            }),
            connect_lock: Mutex::new(()),
            queued: AtomicU32::new(0),
        }
    }

    /// Create a manager and connect it.
    pub async fn initialize(config: DatabaseConfig) -> Result<Self> {
        let manager = Self::new(config);
        manager.connect().await?;
        Ok(manager)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.read_slot().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Build the pool and verify it with a ping.
    ///
    /// Does nothing when already connected. Concurrent callers are serialized,
    /// so only one pool is ever built. Each failed attempt `n` waits
    /// `n * retry_delay` before the next one.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;

        let previous = self.state();
        if previous == ConnectionState::Connected {
            return Ok(());
        }
        self.write_slot().state = ConnectionState::Connecting;

        let attempts = self.config.connect_retries.max(1);
        let mut attempt = 1;
        let source = loop {
            match self.try_connect().await {
                Ok(pool) => {
                    info!(
                        host = %self.config.host,
                        port = self.config.port,
                        database = %self.config.database,
                        max_connections = self.config.connection_limit,
                        "connection pool created"
                    );
                    let mut slot = self.write_slot();
                    slot.pool = Some(pool);
                    slot.state = ConnectionState::Connected;
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "connection attempt failed");
                    if attempt >= attempts {
                        break err;
                    }
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                    attempt += 1;
                }
            }
        };

        self.write_slot().state = previous;
        Err(OrmError::Connection {
            attempts,
            source: source.into(),
        })
    }

    /// One bounded attempt: build the pool, then ping a checked-out connection.
    async fn try_connect(&self) -> Result<MySqlPool, sqlx::Error> {
        let config = &self.config;
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset(&config.charset)
            .timezone(Some(config.timezone.clone()));

        let attempt = async {
            let pool = MySqlPoolOptions::new()
                .max_connections(config.connection_limit.max(1))
                .acquire_timeout(config.connect_timeout)
                .idle_timeout(config.idle_timeout)
                .connect_with(options)
                .await?;
            let mut conn = pool.acquire().await?;
            conn.ping().await?;
            Ok::<_, sqlx::Error>(pool)
        };

        tokio::time::timeout(config.connect_timeout, attempt)
            .await
            .map_err(|_| sqlx::Error::PoolTimedOut)?
    }

    /// Close every pooled connection. A no-op when no pool exists.
    pub async fn close(&self) {
        let _guard = self.connect_lock.lock().await;
        let pool = {
            let mut slot = self.write_slot();
            let pool = slot.pool.take();
            if pool.is_some() {
                slot.state = ConnectionState::Closed;
            }
            pool
        };
        if let Some(pool) = pool {
            pool.close().await;
            info!(database = %self.config.database, "connection pool closed");
        }
    }

    /// The underlying sqlx pool, for collaborators that need the driver directly.
    pub fn pool(&self) -> Result<MySqlPool> {
        self.read_slot().pool.clone().ok_or_else(|| {
            OrmError::Configuration(
                "Connection pool not initialized. Call connect() first.".to_string(),
            )
        })
    }

    /// Check out one connection, honouring `wait_for_connections` and `queue_limit`.
    ///
    /// A caller admitted to the queue waits for as long as every connection
    /// stays leased; the pool's acquire timeout only ends the wait when the
    /// pool has room but cannot open a connection.
    async fn checkout(&self) -> Result<PoolConnection<MySql>> {
        let pool = self.pool()?;
        if let Some(conn) = pool.try_acquire() {
            return Ok(conn);
        }

        // Below the limit acquire() opens a fresh connection without waiting
        let _ticket = admit(&self.queued, &self.config, saturated(&pool))?;

        loop {
            match pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(sqlx::Error::PoolTimedOut)
                    if self.config.wait_for_connections && saturated(&pool) =>
                {
                    debug!(
                        queued = self.queued.load(Ordering::SeqCst),
                        "still waiting for a pooled connection"
                    );
                }
                Err(e) => {
                    return Err(OrmError::Connection {
                        attempts: 1,
                        source: e.into(),
                    });
                }
            }
        }
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn saturated(pool: &MySqlPool) -> bool {
    pool.size() >= pool.options().get_max_connections()
}

/// Admission for a caller that found no idle connection.
///
/// An unsaturated pool needs no ticket. A saturated one either refuses the
/// caller (`wait_for_connections = false`, or `queue_limit` callers already
/// waiting) or hands out a ticket that counts the caller as queued.
fn admit<'a>(
    queued: &'a AtomicU32,
    config: &DatabaseConfig,
    saturated: bool,
) -> Result<Option<QueueTicket<'a>>> {
    if !saturated {
        return Ok(None);
    }
    if !config.wait_for_connections {
        return Err(OrmError::Connection {
            attempts: 1,
            source: "No connections available".into(),
        });
    }
    let ticket = QueueTicket::enter(queued);
    let limit = config.queue_limit;
    if limit > 0 && ticket.position >= limit {
        return Err(OrmError::Connection {
            attempts: 1,
            source: "Queue limit reached".into(),
        });
    }
    Ok(Some(ticket))
}

/// Counts one caller waiting for a connection until dropped.
#[derive(Debug)]
struct QueueTicket<'a> {
    queued: &'a AtomicU32,
    /// Callers already waiting when this one arrived.
    position: u32,
}

impl<'a> QueueTicket<'a> {
    fn enter(queued: &'a AtomicU32) -> Self {
        let position = queued.fetch_add(1, Ordering::SeqCst);
        Self { queued, position }
    }
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for ConnectionManager {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut conn = self.checkout().await?;
        row::fetch_rows(&mut *conn, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut conn = self.checkout().await?;
        row::execute(&mut *conn, sql, params).await
    }
}

#[async_trait]
impl ConnectionPool for ConnectionManager {
    type Connection = MySqlConnection;

    async fn acquire(&self) -> Result<MySqlConnection> {
        Ok(MySqlConnection::new(self.checkout().await?))
    }

    async fn ping(&self) -> bool {
        match self.checkout().await {
            Ok(mut conn) => conn.ping().await.is_ok(),
            Err(_) => false,
        }
    }

    fn stats(&self) -> PoolStats {
        let slot = self.read_slot();
        let Some(pool) = slot.pool.as_ref() else {
            return PoolStats::default();
        };

        let total = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(total);
        PoolStats {
            total_connections: total,
            active_connections: total - idle,
            idle_connections: idle,
            queued_requests: self.queued.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> DatabaseConfig {
        let mut config = DatabaseConfig::new("127.0.0.1", "nobody", "", "nothing")
            .port(1)
            .retry_policy(2, Duration::from_millis(10));
        config.connect_timeout = Duration::from_millis(200);
        config
    }

    #[tokio::test]
    async fn unconnected_manager_is_inert() {
        let manager = ConnectionManager::new(unreachable_config());

        assert_eq!(manager.state(), ConnectionState::Uninitialized);
        assert_eq!(manager.stats(), PoolStats::default());
        assert!(!manager.ping().await);
        assert!(matches!(
            manager.query("SELECT 1", &[]).await,
            Err(OrmError::Configuration(_))
        ));

        manager.close().await;
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn connect_gives_up_after_configured_attempts() {
        let manager = ConnectionManager::new(unreachable_config());

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, OrmError::Connection { attempts: 2, .. }));
        assert!(err.to_string().starts_with("Failed to connect after 2 attempts"));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
        assert!(!manager.is_connected());
    }

    #[test]
    fn unsaturated_pool_admits_without_queueing() {
        let queued = AtomicU32::new(0);
        let config = unreachable_config().wait_for_connections(false);

        let ticket = admit(&queued, &config, false).unwrap();
        assert!(ticket.is_none());
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn saturated_pool_fails_fast_without_waiting() {
        let queued = AtomicU32::new(0);
        let config = unreachable_config().wait_for_connections(false);

        let err = admit(&queued, &config, true).unwrap_err();
        assert!(matches!(err, OrmError::Connection { attempts: 1, .. }));
        assert!(err.to_string().contains("No connections available"));
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn queue_limit_rejects_the_overflow_caller() {
        let queued = AtomicU32::new(0);
        let config = unreachable_config().queue_limit(2);

        let first = admit(&queued, &config, true).unwrap();
        let second = admit(&queued, &config, true).unwrap();
        assert!(first.is_some() && second.is_some());
        assert_eq!(queued.load(Ordering::SeqCst), 2);

        let err = admit(&queued, &config, true).unwrap_err();
        assert!(err.to_string().contains("Queue limit reached"));
        assert_eq!(queued.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(queued.load(Ordering::SeqCst), 1);
        assert!(admit(&queued, &config, true).unwrap().is_some());
        drop(second);
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_queue_limit_is_unbounded() {
        let queued = AtomicU32::new(0);
        let config = unreachable_config();

        let tickets = (0..50)
            .map(|_| admit(&queued, &config, true).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(queued.load(Ordering::SeqCst), 50);
        drop(tickets);
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn queue_ticket_releases_its_slot() {
        let queued = AtomicU32::new(0);
        {
            let first = QueueTicket::enter(&queued);
            let second = QueueTicket::enter(&queued);
            assert_eq!((first.position, second.position), (0, 1));
            assert_eq!(queued.load(Ordering::SeqCst), 2);
        }
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }
}
