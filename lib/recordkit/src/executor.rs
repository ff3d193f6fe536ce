//! Statement execution traits implemented by database backends.
//!
//! Records and query builders only ever talk to a `&dyn QueryExecutor`, so the
//! same code runs against a pool or inside a [`Transaction`](crate::Transaction).

use async_trait::async_trait;
use serde::Serialize;

use crate::{Result, Row, Value};

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    /// Rows returned by the statement, if any.
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    /// Auto-increment key generated by an INSERT.
    pub last_insert_id: Option<u64>,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
    pub queued_requests: u32,
}

/// Runs parameterized SQL with `?` placeholders.
///
/// Also the contract for collaborators outside the ORM (DDL helpers, job
/// runners) that need to send arbitrary statements over the same pool.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement and return its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement and return its rows plus mutation metadata.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;
}

/// A dedicated connection checked out of a pool.
///
/// Dropping it hands the connection back to the pool.
#[async_trait]
pub trait TransactionExecutor: Send {
    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult>;
}

/// A pool that can also lease a connection for exclusive use.
#[async_trait]
pub trait ConnectionPool: QueryExecutor {
    /// The leased connection type.
    type Connection: TransactionExecutor + 'static;

    /// Check out one connection. The caller owns it until it is dropped.
    async fn acquire(&self) -> Result<Self::Connection>;

    /// Best-effort liveness probe; never fails.
    async fn ping(&self) -> bool;

    /// Current occupancy, all zero when no pool exists.
    fn stats(&self) -> PoolStats;
}
