//! Recordkit - active records, a fluent query builder and scoped transactions.
//!
//! This crate is backend-agnostic: everything runs against a
//! [`QueryExecutor`], implemented by a database backend's pool (see the
//! `recordkit-mysql` crate) and by [`Transaction`].
//!
//! # Core Concepts
//!
//! - **Model**: a table schema (name, primary key, mass-assignment rules,
//!   hidden columns, casts), usually derived with `#[derive(Model)]`.
//! - **Record**: one row of a model's table with dirty tracking against the
//!   snapshot it was loaded or saved with.
//! - **QueryBuilder**: clause accumulator compiling to SQL with `?`
//!   placeholders and an ordered parameter list.
//! - **Transaction**: a unit of work pinned to one leased connection that
//!   always ends in exactly one commit or rollback.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

extern crate self as recordkit;

mod config;
mod error;
mod executor;
mod model;
pub mod paginator;
mod query;
mod record;
mod repository;
mod soft_delete;
pub mod time;
mod transaction;
mod value;

#[cfg(test)]
mod test_support;

pub use config::DatabaseConfig;
pub use error::{BoxError, OrmError, Result};
pub use executor::{ConnectionPool, ExecResult, PoolStats, QueryExecutor, TransactionExecutor};
pub use model::{Cast, Model, SoftDeletes, cast_row, fillable_data};
pub use paginator::{
    CursorPage, PageLinks, PageMeta, Paginated, SimplePage, cursor_paginate, page_numbers,
    paginate, simple_paginate,
};
pub use query::{
    Chunks, CompiledQuery, JoinClause, JoinKind, Logic, Operator, Order, OrderClause,
    QueryBuilder, WhereClause,
};
pub use record::{INSERT_BATCH_SIZE, Record};
pub use repository::Repository;
pub use transaction::{BatchStep, Transaction};
pub use value::{FromRow, Row, Value};

// Re-export derive macro
// Note: `soft_delete` in #[model(...)] also implements SoftDeletes
pub use recordkit_derive::Model;
