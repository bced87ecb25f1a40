// src/fetch/mod.rs

pub mod http;
pub mod inspect;

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::months::MonthId;

pub use http::HttpSource;

/// A month's file, downloaded into the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub month: MonthId,
    pub path: PathBuf,
    pub bytes: u64,
    /// Row count from the Parquet footer, when it was read.
    pub rows: Option<i64>,
}

/// Transport or local failure while downloading one month.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building URL: {0}")]
    Url(#[from] crate::config::ConfigError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no data received for {after:?}")]
    Stalled { after: Duration },

    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid Parquet file: {source}")]
    InvalidParquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },
}

/// What happened when a month was requested. Kept as three kinds because
/// the loop reacts differently to each: a missing file ends the run, a
/// transport failure only skips the month.
#[derive(Debug)]
pub enum FetchOutcome {
    Downloaded(ScratchFile),
    /// Any status other than 200; the month (and every later one) is
    /// assumed not to be published yet.
    NotPublished { status: u16 },
    Unreachable(FetchError),
}

/// Where monthly files come from.
#[async_trait]
pub trait Source: Send {
    /// Download `month` into `dest`, overwriting anything already there.
    async fn fetch(&mut self, month: MonthId, dest: &Path) -> FetchOutcome;
}
