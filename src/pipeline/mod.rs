// src/pipeline/mod.rs

pub mod workspace;

use futures_util::FutureExt;
use std::{panic::AssertUnwindSafe, path::PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::fetch::{FetchOutcome, Source};
use crate::months::MonthId;
use crate::warehouse::{LoadStatement, Warehouse, WarehouseError};

pub use workspace::ScratchDir;

/// How far a month got. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MonthState {
    Pending,
    Downloaded,
    Staged,
    Ingested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthOutcome {
    Ingested,
    /// Source answered with a non-200 status; the loop stopped here.
    NotPublished { status: u16 },
    DownloadFailed { error: String },
    UploadFailed { error: String },
    IngestFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthReport {
    pub month: MonthId,
    pub state: MonthState,
    pub outcome: MonthOutcome,
}

/// Per-month results in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<MonthReport>,
    /// Month whose file was not published yet, if the run stopped early.
    pub stopped_at: Option<MonthId>,
}

impl RunSummary {
    pub fn attempted(&self) -> Vec<MonthId> {
        self.reports.iter().map(|r| r.month).collect()
    }

    pub fn ingested(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == MonthOutcome::Ingested)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    MonthOutcome::DownloadFailed { .. }
                        | MonthOutcome::UploadFailed { .. }
                        | MonthOutcome::IngestFailed { .. }
                )
            })
            .count()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("scratch directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("warehouse session could not be opened: {0}")]
    Connect(#[source] WarehouseError),
}

/// Fetch, stage and load every month in `months`, in order.
///
/// The warehouse session is opened before anything is downloaded; failing
/// that ends the run with [`PipelineError::Connect`]. The scratch directory
/// is recreated before the first month and removed afterwards, and
/// `warehouse` is closed, on every exit path: normal end, early stop, error
/// or panic.
pub async fn run<S, W>(
    config: &PipelineConfig,
    months: &[MonthId],
    source: &mut S,
    warehouse: &mut W,
) -> Result<RunSummary, PipelineError>
where
    S: Source + ?Sized,
    W: Warehouse + ?Sized,
{
    let result = AssertUnwindSafe(load_months(config, months, source, warehouse))
        .catch_unwind()
        .await;

    if let Err(e) = warehouse.close().await {
        error!(error = %e, "closing warehouse connection failed");
    }

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn load_months<S, W>(
    config: &PipelineConfig,
    months: &[MonthId],
    source: &mut S,
    warehouse: &mut W,
) -> Result<RunSummary, PipelineError>
where
    S: Source + ?Sized,
    W: Warehouse + ?Sized,
{
    let workspace_err = |source| PipelineError::Workspace {
        path: config.scratch_dir.clone(),
        source,
    };
    let scratch = ScratchDir::prepare(&config.scratch_dir).map_err(workspace_err)?;

    warehouse.open().await.map_err(PipelineError::Connect)?;
    info!("warehouse session open");

    let mut summary = RunSummary::default();
    for &month in months {
        let report = load_month(config, month, &scratch, source, warehouse).await;
        let stop = matches!(report.outcome, MonthOutcome::NotPublished { .. });
        summary.reports.push(report);
        if stop {
            summary.stopped_at = Some(month);
            break;
        }
    }

    scratch.remove().map_err(workspace_err)?;
    Ok(summary)
}

/// One month: PENDING → DOWNLOADED → STAGED → INGESTED.
#[instrument(level = "info", skip_all, fields(month = %month))]
async fn load_month<S, W>(
    config: &PipelineConfig,
    month: MonthId,
    scratch: &ScratchDir,
    source: &mut S,
    warehouse: &mut W,
) -> MonthReport
where
    S: Source + ?Sized,
    W: Warehouse + ?Sized,
{
    let report = |state, outcome| MonthReport {
        month,
        state,
        outcome,
    };

    info!("downloading");
    let file = match source.fetch(month, &scratch.file_for(month)).await {
        FetchOutcome::Downloaded(file) => file,
        FetchOutcome::NotPublished { status } => {
            warn!(status, "not published yet; stopping");
            return report(MonthState::Pending, MonthOutcome::NotPublished { status });
        }
        FetchOutcome::Unreachable(e) => {
            error!(step = "download", error = %e, "network error; skipping month");
            return report(
                MonthState::Pending,
                MonthOutcome::DownloadFailed {
                    error: e.to_string(),
                },
            );
        }
    };
    info!(bytes = file.bytes, rows = ?file.rows, "downloaded");

    let put = LoadStatement::put(&file.path, &config.stage);
    if let Err(e) = warehouse.execute(&put).await {
        error!(step = put.step(), error = %e, "warehouse error");
        return report(
            MonthState::Downloaded,
            MonthOutcome::UploadFailed {
                error: e.to_string(),
            },
        );
    }
    info!(stage = %config.stage, "staged");

    // the staged copy is authoritative from here on
    if let Err(e) = fs::remove_file(&file.path).await {
        warn!(step = "cleanup", path = %file.path.display(), error = %e, "could not delete scratch file");
    }

    let copy = LoadStatement::copy_into(&config.raw_table, &config.stage, &month.file_name());
    if let Err(e) = warehouse.execute(&copy).await {
        error!(step = copy.step(), error = %e, "warehouse error");
        return report(
            MonthState::Staged,
            MonthOutcome::IngestFailed {
                error: e.to_string(),
            },
        );
    }
    info!(table = %config.raw_table, "ingested");

    report(MonthState::Ingested, MonthOutcome::Ingested)
}
