//! Dedicated pooled connection implementing TransactionExecutor.

use async_trait::async_trait;
use recordkit::{ExecResult, OrmError, Result, Row, TransactionExecutor, Value};
use sqlx::pool::PoolConnection;
use sqlx::{Executor, MySql};
use tracing::{debug, error, warn};

use crate::row;

/// One connection checked out of a [`ConnectionManager`](crate::ConnectionManager).
///
/// Returned to the pool when dropped. A connection dropped with a transaction
/// still open is closed instead, which makes the server discard the transaction.
pub struct MySqlConnection {
    conn: PoolConnection<MySql>,
    in_transaction: bool,
}

impl MySqlConnection {
    pub(crate) fn new(conn: PoolConnection<MySql>) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Transaction control goes over the text protocol; MySQL cannot prepare it.
    async fn control(&mut self, statement: &'static str) -> Result<()> {
        debug!(sql = statement, "transaction control");
        (&mut *self.conn)
            .execute(statement)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!(sql = statement, error = %e, "statement failed");
                OrmError::query(statement, &[], e)
            })
    }
}

#[async_trait]
impl TransactionExecutor for MySqlConnection {
    async fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(OrmError::TransactionState(
                "Transaction already started on this connection".to_string(),
            ));
        }
        self.control("START TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.control("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let result = self.control("ROLLBACK").await;
        if result.is_ok() {
            self.in_transaction = false;
        }
        result
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        row::fetch_rows(&mut *self.conn, sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        row::execute(&mut *self.conn, sql, params).await
    }
}

impl Drop for MySqlConnection {
    fn drop(&mut self) {
        if self.in_transaction {
            warn!("connection released with an open transaction; closing it");
            self.conn.close_on_drop();
        }
    }
}
