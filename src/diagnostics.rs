//! Caller-supplied reporting of failures.
//!
//! The crate never prints. Every failure it returns is also handed to the
//! handle's [`DiagnosticSink`], which defaults to [`TracingSink`].

use crate::error::SqliteError;

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &SqliteError);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&SqliteError) + Send + Sync,
{
    fn report(&self, error: &SqliteError) {
        self(error)
    }
}

/// Forwards failures to `tracing` as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &SqliteError) {
        match error {
            SqliteError::Statement { sql, source } => {
                tracing::warn!(sql = %sql, error = %source, "error running sql command");
            }
            other => tracing::warn!(error = %other, "sqlite operation failed"),
        }
    }
}
