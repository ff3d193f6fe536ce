//! Scoped units of work on one dedicated connection.
//!
//! A [`Transaction`] owns a connection leased from a [`ConnectionPool`] until
//! it commits or rolls back. Statements issued through it are serialized by
//! an async mutex, so it can be shared as `Arc<Transaction<_>>` and passed as
//! `&dyn QueryExecutor` to records and query builders.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::{
    ConnectionPool, ExecResult, OrmError, QueryExecutor, Result, Row, TransactionExecutor, Value,
};

/// One step of [`Transaction::batch`].
pub type BatchStep<C, T> =
    Box<dyn FnOnce(Arc<Transaction<C>>) -> BoxFuture<'static, Result<T>> + Send>;

pub struct Transaction<C: TransactionExecutor> {
    connection: Mutex<Option<C>>,
    completed: AtomicBool,
    rolled_back: AtomicBool,
}

impl<C: TransactionExecutor> Transaction<C> {
    /// Wrap a leased connection. No statement is sent until [`begin`](Self::begin).
    pub fn new(connection: C) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            completed: AtomicBool::new(false),
            rolled_back: AtomicBool::new(false),
        }
    }

    /// Lease a connection from `pool` and open a transaction on it.
    pub async fn start<P>(pool: &P) -> Result<Self>
    where
        P: ConnectionPool<Connection = C>,
    {
        let tx = Self::new(pool.acquire().await?);
        tx.begin().await?;
        Ok(tx)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back.load(Ordering::SeqCst)
    }

    pub async fn begin(&self) -> Result<()> {
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        bound(&mut guard)?.begin().await
    }

    /// Commit and hand the connection back to the pool.
    ///
    /// On failure the connection stays bound so the caller can still roll back.
    pub async fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        if self.is_rolled_back() {
            return Err(OrmError::TransactionState(
                "Transaction was rolled back".to_string(),
            ));
        }

        let mut guard = self.connection.lock().await;
        bound(&mut guard)?.commit().await?;
        guard.take();
        self.completed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Roll back and hand the connection back to the pool.
    ///
    /// The transaction is completed afterwards even if the rollback statement
    /// itself failed.
    pub async fn rollback(&self) -> Result<()> {
        self.ensure_open()?;

        let mut guard = self.connection.lock().await;
        let mut connection = guard.take().ok_or_else(not_bound)?;
        let result = connection.rollback().await;
        self.rolled_back.store(true, Ordering::SeqCst);
        self.completed.store(true, Ordering::SeqCst);
        drop(connection);
        result
    }

    /// Run `f` inside a transaction on a connection leased from `pool`.
    ///
    /// Commits when `f` succeeds and returns its value. When `f` fails the
    /// transaction is rolled back and `f`'s error is returned unchanged; a
    /// failing rollback is logged, not returned. If `f` completed the
    /// transaction itself, nothing further is sent.
    pub async fn run<P, F, Fut, T, E>(pool: &P, f: F) -> Result<T, E>
    where
        P: ConnectionPool<Connection = C>,
        F: FnOnce(Arc<Transaction<C>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<OrmError>,
    {
        let tx = Arc::new(Self::start(pool).await?);

        match f(Arc::clone(&tx)).await {
            Ok(value) => {
                if tx.is_completed() {
                    return Ok(value);
                }
                if let Err(commit_err) = tx.commit().await {
                    tx.rollback_quietly().await;
                    return Err(commit_err.into());
                }
                Ok(value)
            }
            Err(err) => {
                tx.rollback_quietly().await;
                Err(err)
            }
        }
    }

    /// Run `steps` in order inside one transaction, collecting their results.
    ///
    /// The first failing step rolls everything back and its error is returned.
    pub async fn batch<P, T>(pool: &P, steps: Vec<BatchStep<C, T>>) -> Result<Vec<T>>
    where
        P: ConnectionPool<Connection = C>,
        T: Send + 'static,
    {
        Self::run(pool, |tx| async move {
            let mut results = Vec::with_capacity(steps.len());
            for step in steps {
                results.push(step(Arc::clone(&tx)).await?);
            }
            Ok(results)
        })
        .await
    }

    async fn rollback_quietly(&self) {
        if self.is_completed() {
            return;
        }
        if let Err(err) = self.rollback().await {
            tracing::error!(error = %err, "rollback failed");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_completed() {
            return Err(OrmError::TransactionState(
                "Transaction already completed".to_string(),
            ));
        }
        Ok(())
    }
}

fn bound<C>(slot: &mut Option<C>) -> Result<&mut C> {
    slot.as_mut().ok_or_else(not_bound)
}

fn not_bound() -> OrmError {
    OrmError::TransactionState("No connection bound to transaction".to_string())
}

#[async_trait]
impl<C: TransactionExecutor> QueryExecutor for Transaction<C> {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        bound(&mut guard)?.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        bound(&mut guard)?.execute(sql, params).await
    }
}

impl<C: TransactionExecutor> Drop for Transaction<C> {
    fn drop(&mut self) {
        if !self.is_completed() && self.connection.get_mut().is_some() {
            tracing::warn!("transaction dropped without commit or rollback");
        }
    }
}
