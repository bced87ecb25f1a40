// src/warehouse/mod.rs

pub mod snowsql;

use async_trait::async_trait;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub use snowsql::SnowSqlWarehouse;

/// The two statements the loader issues per month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatement {
    /// Upload a local file to an internal stage, uncompressed, replacing any
    /// staged object of the same name.
    Put { local_path: PathBuf, stage: String },
    /// Load one staged Parquet file into `table`, matching columns by name
    /// case-insensitively and skipping rows that fail.
    CopyInto {
        table: String,
        stage: String,
        file_name: String,
    },
}

impl LoadStatement {
    pub fn put(local_path: &Path, stage: &str) -> Self {
        LoadStatement::Put {
            local_path: local_path.to_path_buf(),
            stage: stage.to_string(),
        }
    }

    pub fn copy_into(table: &str, stage: &str, file_name: &str) -> Self {
        LoadStatement::CopyInto {
            table: table.to_string(),
            stage: stage.to_string(),
            file_name: file_name.to_string(),
        }
    }

    /// Pipeline step this statement belongs to, for logs.
    pub fn step(&self) -> &'static str {
        match self {
            LoadStatement::Put { .. } => "upload",
            LoadStatement::CopyInto { .. } => "ingest",
        }
    }
}

/// `file://` URI for `path`, forward slashes only. Quoted when the path has
/// characters the PUT grammar does not accept bare.
fn file_uri(path: &Path) -> String {
    let uri = format!("file://{}", path.display().to_string().replace('\\', "/"));
    if uri.chars().any(|c| c.is_whitespace() || c == '\'' || c == ';') {
        format!("'{}'", uri.replace('\'', "\\'"))
    } else {
        uri
    }
}

impl fmt::Display for LoadStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatement::Put { local_path, stage } => write!(
                f,
                "PUT {} @{} AUTO_COMPRESS=FALSE OVERWRITE=TRUE",
                file_uri(local_path),
                stage
            ),
            LoadStatement::CopyInto {
                table,
                stage,
                file_name,
            } => write!(
                f,
                "COPY INTO {table} FROM @{stage}/{file_name} \
                 FILE_FORMAT = (TYPE = 'PARQUET') \
                 MATCH_BY_COLUMN_NAME = CASE_INSENSITIVE \
                 ON_ERROR = 'CONTINUE'"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} statement failed (exit {status:?}): {details}")]
    Failed {
        step: &'static str,
        status: Option<i32>,
        details: String,
    },

    #[error("warehouse connection is closed")]
    Closed,
}

/// A warehouse session. Used by one thread for the whole run.
#[async_trait]
pub trait Warehouse: Send {
    /// Connect and check the session is usable. Called once, before any
    /// month is downloaded.
    async fn open(&mut self) -> Result<(), WarehouseError>;

    async fn execute(&mut self, statement: &LoadStatement) -> Result<(), WarehouseError>;

    /// Release the session. Later `execute` calls fail with
    /// [`WarehouseError::Closed`].
    async fn close(&mut self) -> Result<(), WarehouseError>;
}
