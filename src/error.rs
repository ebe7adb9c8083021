use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the connection handle and the statement builder.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Bad construction arguments: path, mode, or builder input shapes.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The native connection could not be opened.
    #[error("failed to open database at {}: {}", .path.display(), .source)]
    Connection {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("database handle is closed")]
    ClosedHandle,

    /// SQLite rejected the statement (syntax, constraint, locking, ...).
    #[error("error running sql command `{sql}`: {source}")]
    Statement {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl SqliteError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SqliteError::InvalidConfiguration(message.into())
    }

    /// The statement text attached to a `Statement` failure.
    pub fn sql(&self) -> Option<&str> {
        match self {
            SqliteError::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqliteError>;
