use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqliteError};

/// File extension a database path must carry.
pub const DB_EXTENSION: &str = "db";

/// How the native connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    #[serde(rename = "RO", alias = "read_only")]
    ReadOnly,
    #[serde(rename = "CW", alias = "read_write_create")]
    ReadWriteCreate,
}

impl OpenMode {
    pub(crate) fn flags(self) -> OpenFlags {
        let access = match self {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        // only the connection's background thread touches it
        access | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

impl FromStr for OpenMode {
    type Err = SqliteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RO" | "read_only" => Ok(OpenMode::ReadOnly),
            "CW" | "read_write_create" => Ok(OpenMode::ReadWriteCreate),
            other => Err(SqliteError::invalid(format!("unknown open mode `{other}`"))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::ReadOnly => "RO",
            OpenMode::ReadWriteCreate => "CW",
        })
    }
}

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    pub mode: OpenMode,
    /// Switch the journal to write-ahead logging right after opening
    #[serde(default)]
    pub wal: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and mode
    pub fn new(db_path: impl Into<PathBuf>, mode: OpenMode) -> Self {
        Self {
            db_path: db_path.into(),
            mode,
            wal: false,
        }
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    /// Parse a config from JSON, e.g. `{"db_path": "app.db", "mode": "CW"}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SqliteError::invalid(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !has_db_extension(&self.db_path) {
            return Err(SqliteError::invalid(format!(
                "database path `{}` must end in .{DB_EXTENSION}",
                self.db_path.display()
            )));
        }
        if self.wal && self.mode == OpenMode::ReadOnly {
            return Err(SqliteError::invalid(
                "write-ahead logging cannot be enabled on a read-only connection",
            ));
        }
        Ok(())
    }
}

fn has_db_extension(path: &Path) -> bool {
    path.file_stem().is_some() && path.extension().is_some_and(|ext| ext == DB_EXTENSION)
}
