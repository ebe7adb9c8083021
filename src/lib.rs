//! Asynchronous SQLite data access with a parameterized statement builder.
//!
//! # Intention
//!
//! - Own one SQLite connection per [`ConnectionHandle`] and run every
//!   statement off the caller's thread, resolving results through futures.
//! - Offer ordered and unordered units of work for scheduling statements.
//! - Render injection-safe SQL for table creation/deletion, inserts, updates
//!   and deletes through [`SqliteWriter`].
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No console output: failures go to a [`DiagnosticSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlite_writer::{ConnectionHandle, OpenMode, SqliteConfig, SqliteWriter, Value};
//!
//! let handle = ConnectionHandle::open(SqliteConfig::new("app.db", OpenMode::ReadWriteCreate)).await?;
//! let writer = SqliteWriter::new(handle);
//! writer.create_table("users", &["name", "age"], &["TEXT", "INTEGER"]).await?;
//! writer.insert_row("users", &["name", "age"], vec![Value::from("Ann"), Value::from(30)]).await?;
//! writer.close_db().await?;
//! ```

pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod statement;
pub mod value;
pub mod writer;

pub use config::{OpenMode, SqliteConfig};
pub use connection::{ConnectionHandle, Executor, Scheduling, UnitOfWork};
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use error::{Result, SqliteError};
pub use statement::{RowData, SqlStatement, StatementKind};
pub use value::{DataType, ExecOutcome, Params, Row, Value};
pub use writer::SqliteWriter;
