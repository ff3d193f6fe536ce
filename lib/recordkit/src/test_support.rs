//! In-memory executor that records statements and replays scripted results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    ConnectionPool, ExecResult, OrmError, PoolStats, QueryExecutor, Result, Row,
    TransactionExecutor, Value,
};

enum Scripted {
    Rows(Vec<Row>),
    Exec(ExecResult),
    Fail(String),
}

#[derive(Default)]
struct Inner {
    responses: Mutex<VecDeque<Scripted>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
    failing: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

/// Recording executor. Each statement pops the next scripted response;
/// with none queued, queries return no rows and writes report one affected
/// row and a fresh insert id.
#[derive(Clone, Default)]
pub(crate) struct MockDb {
    inner: Arc<Inner>,
}

impl MockDb {
    pub(crate) fn new() -> Self {
        let db = Self::default();
        db.inner.next_id.store(1, Ordering::SeqCst);
        db
    }

    pub(crate) fn push_rows(&self, rows: Vec<Row>) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Rows(rows));
    }

    pub(crate) fn push_exec(&self, affected_rows: u64, last_insert_id: Option<u64>) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Exec(ExecResult {
                rows: Vec::new(),
                affected_rows,
                last_insert_id,
            }));
    }

    pub(crate) fn push_error(&self, message: &str) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// Fail every statement whose SQL contains `pattern`, without consuming a response.
    pub(crate) fn fail_matching(&self, pattern: &str) {
        self.inner
            .failing
            .lock()
            .unwrap()
            .push(pattern.to_string());
    }

    pub(crate) fn log(&self) -> Vec<(String, Vec<Value>)> {
        self.inner.log.lock().unwrap().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log().into_iter().map(|(sql, _)| sql).collect()
    }

    /// Log a statement and apply forced failures.
    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        self.inner
            .log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        let fails = self
            .inner
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| sql.contains(pattern.as_str()));
        if fails {
            return Err(OrmError::query(sql, params, format!("forced failure: {sql}")));
        }
        Ok(())
    }

    fn respond(&self, sql: &str, params: &[Value]) -> Result<Option<Scripted>> {
        self.record(sql, params)?;
        match self.inner.responses.lock().unwrap().pop_front() {
            Some(Scripted::Fail(message)) => Err(OrmError::query(sql, params, message)),
            other => Ok(other),
        }
    }

    fn run_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        Ok(match self.respond(sql, params)? {
            Some(Scripted::Rows(rows)) => rows,
            Some(Scripted::Exec(result)) => result.rows,
            _ => Vec::new(),
        })
    }

    fn run_execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        Ok(match self.respond(sql, params)? {
            Some(Scripted::Exec(result)) => result,
            Some(Scripted::Rows(rows)) => ExecResult {
                affected_rows: rows.len() as u64,
                rows,
                last_insert_id: None,
            },
            _ => ExecResult {
                rows: Vec::new(),
                affected_rows: 1,
                last_insert_id: Some(self.inner.next_id.fetch_add(1, Ordering::SeqCst)),
            },
        })
    }
}

#[async_trait]
impl QueryExecutor for MockDb {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run_query(sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.run_execute(sql, params)
    }
}

#[async_trait]
impl ConnectionPool for MockDb {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<MockConnection> {
        Ok(MockConnection { db: self.clone() })
    }

    async fn ping(&self) -> bool {
        true
    }

    fn stats(&self) -> PoolStats {
        PoolStats::default()
    }
}

/// Leased connection sharing the pool's log and script.
pub(crate) struct MockConnection {
    db: MockDb,
}

#[async_trait]
impl TransactionExecutor for MockConnection {
    async fn begin(&mut self) -> Result<()> {
        self.db.record("START TRANSACTION", &[])
    }

    async fn commit(&mut self) -> Result<()> {
        self.db.record("COMMIT", &[])
    }

    async fn rollback(&mut self) -> Result<()> {
        self.db.record("ROLLBACK", &[])
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.db.run_query(sql, params)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.db.run_execute(sql, params)
    }
}
