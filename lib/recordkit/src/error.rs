use thiserror::Error;

use crate::Value;

/// Boxed driver error carried by connection and statement failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to connect after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("{source}")]
    Query {
        sql: String,
        params: Vec<Value>,
        #[source]
        source: BoxError,
    },

    #[error("Record not found in {table} with key: {key}")]
    NotFound { table: String, key: String },

    #[error("Transaction error: {0}")]
    TransactionState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrmError {
    /// Wrap a driver error raised while running `sql` with `params`.
    pub fn query(sql: &str, params: &[Value], source: impl Into<BoxError>) -> Self {
        OrmError::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrmError::NotFound { .. })
    }
}

pub type Result<T, E = OrmError> = std::result::Result<T, E>;
