//! MySQL backend for recordkit.
//!
//! [`ConnectionManager`] owns an sqlx MySQL pool and implements
//! [`QueryExecutor`] and [`ConnectionPool`], so records, query builders and
//! transactions from the core crate run against it directly.
//!
//! # Usage
//!
//! ```text
//! use recordkit_mysql::{ConnectionManager, DatabaseConfig, Model, Record, Transaction, row};
//!
//! #[derive(Model)]
//! #[model(table = "users", fillable(name, email), hidden(password))]
//! pub struct User;
//!
//! let db = ConnectionManager::initialize(DatabaseConfig::from_env()).await?;
//! let user = Record::<User>::find_or_fail(&db, 1).await?;
//!
//! Transaction::run(&db, |tx| async move {
//!     Record::<User>::create(&*tx, row! { "name" => "Ada" }).await
//! })
//! .await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod connection;
mod manager;
mod row;

pub use connection::MySqlConnection;
pub use manager::{ConnectionManager, ConnectionState};

/// A transaction on a dedicated MySQL connection.
pub type MySqlTransaction = Transaction<MySqlConnection>;

// Re-export core types for convenience
pub use recordkit::{
    ConnectionPool, DatabaseConfig, ExecResult, FromRow, Model, OrmError, PoolStats,
    QueryBuilder, QueryExecutor, Record, Repository, Result, Row, SoftDeletes, Transaction,
    TransactionExecutor, Value, row,
};
