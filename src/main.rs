use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use tripload::{
    config::PipelineConfig,
    credentials,
    fetch::{inspect, HttpSource},
    months::{plan_months, MonthId},
    pipeline,
    warehouse::SnowSqlWarehouse,
};

#[derive(Parser)]
#[command(name = "tripload", version)]
#[command(about = "Load monthly NYC yellow-taxi trip files into Snowflake")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download, stage and load every published month
    Run(RunArgs),
    /// Print the months a run would attempt
    Plan(RangeArgs),
    /// Print Parquet metadata of a local trip file
    Inspect {
        /// Path to a .parquet file
        path: PathBuf,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// First month (YYYY-MM)
    #[arg(long)]
    anchor: Option<MonthId>,
    /// Last month to plan (YYYY-MM); defaults to the current month
    #[arg(long)]
    end: Option<MonthId>,
    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    range: RangeArgs,
    /// Source URL template containing {month}
    #[arg(long)]
    source_url: Option<String>,
    /// Local scratch directory
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    /// Profile name in profiles.yml
    #[arg(long)]
    profile: Option<String>,
    /// Target under the profile's outputs
    #[arg(long)]
    target: Option<String>,
    /// profiles.yml location; repeat to search several, in order
    #[arg(long = "profiles-file")]
    profiles_files: Vec<PathBuf>,
    /// Internal stage receiving uploads
    #[arg(long)]
    stage: Option<String>,
    /// Raw table loaded by COPY INTO
    #[arg(long)]
    table: Option<String>,
    /// Connection timeout for downloads
    #[arg(long)]
    connect_timeout_secs: Option<u64>,
    /// Give up on a download after this long without receiving data
    #[arg(long)]
    stall_timeout_secs: Option<u64>,
    /// snowsql executable
    #[arg(long, default_value = tripload::warehouse::snowsql::DEFAULT_PROGRAM)]
    snowsql: String,
}

impl RangeArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(anchor) = self.anchor {
            config.anchor = anchor;
        }
        if self.end.is_some() {
            config.end = self.end;
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl RunArgs {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        self.range.apply(&mut config);
        if let Some(url) = &self.source_url {
            config.source_url_template = url.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        if let Some(profile) = &self.profile {
            config.profile_name = profile.clone();
        }
        if let Some(target) = &self.target {
            config.target_name = target.clone();
        }
        if !self.profiles_files.is_empty() {
            config.profile_paths = self.profiles_files.clone();
        }
        if let Some(stage) = &self.stage {
            config.stage = stage.clone();
        }
        if let Some(table) = &self.table {
            config.raw_table = table.clone();
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.stall_timeout_secs {
            config.stall_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}", info);
    }));

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Plan(args) => {
            let mut config = PipelineConfig::default();
            args.apply(&mut config);
            for month in plan_months(config.anchor, args.today(), config.end) {
                println!("{month}");
            }
            Ok(())
        }
        Command::Inspect { path } => {
            let summary = inspect::summarize(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            println!("file:        {}", path.display());
            println!("created by:  {}", summary.created_by.as_deref().unwrap_or("<unknown>"));
            println!("rows:        {}", summary.rows);
            println!("row groups:  {}", summary.row_groups);
            println!("columns:     {}", summary.columns.join(", "));
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.config();
    info!("startup");

    // ─── 2) resolve credentials ──────────────────────────────────────
    let descriptor =
        credentials::resolve_default(&config).context("resolving warehouse credentials")?;

    // ─── 3) plan months ──────────────────────────────────────────────
    let months = plan_months(config.anchor, args.range.today(), config.end);
    match (months.first(), months.last()) {
        (Some(first), Some(last)) => info!(%first, %last, count = months.len(), "planned months"),
        _ => warn!("no months to load"),
    }

    // ─── 4) build collaborators ──────────────────────────────────────
    let mut source = HttpSource::new(&config.source_url_template, config.connect_timeout)
        .context("building HTTP source")?
        .with_stall_timeout(config.stall_timeout)
        .with_progress_every(config.progress_every_bytes);
    let mut warehouse = SnowSqlWarehouse::new(descriptor).with_program(args.snowsql);

    // ─── 5) fetch, stage, load ───────────────────────────────────────
    let summary = pipeline::run(&config, &months, &mut source, &mut warehouse)
        .await
        .context("pipeline aborted")?;

    info!(
        attempted = summary.reports.len(),
        ingested = summary.ingested(),
        failed = summary.failed(),
        stopped_at = ?summary.stopped_at.map(|m| m.to_string()),
        "Pipeline finished"
    );
    Ok(())
}
