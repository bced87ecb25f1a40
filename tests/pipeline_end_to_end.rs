use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use tempfile::tempdir;
use tripload::{
    config::PipelineConfig,
    fetch::{FetchOutcome, ScratchFile, Source},
    months::{plan_months, MonthId, ANCHOR},
    pipeline::{self, MonthOutcome, MonthState},
    warehouse::{LoadStatement, Warehouse, WarehouseError},
};

/// Serves bytes for every month except `missing`, which answers 404.
struct FakeHost {
    missing: MonthId,
    requested: Vec<MonthId>,
}

#[async_trait]
impl Source for FakeHost {
    async fn fetch(&mut self, month: MonthId, dest: &Path) -> FetchOutcome {
        self.requested.push(month);
        if month == self.missing {
            return FetchOutcome::NotPublished { status: 404 };
        }
        std::fs::write(dest, b"PAR1").unwrap();
        FetchOutcome::Downloaded(ScratchFile {
            month,
            path: dest.to_path_buf(),
            bytes: 4,
            rows: None,
        })
    }
}

#[derive(Default)]
struct FakeWarehouse {
    opened: usize,
    statements: Vec<LoadStatement>,
    closed: usize,
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn open(&mut self) -> Result<(), WarehouseError> {
        self.opened += 1;
        Ok(())
    }

    async fn execute(&mut self, statement: &LoadStatement) -> Result<(), WarehouseError> {
        self.statements.push(statement.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        self.closed += 1;
        Ok(())
    }
}

#[tokio::test]
async fn stops_at_first_unpublished_month() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let months = plan_months(ANCHOR, today, None);
    let labels: Vec<String> = months.iter().map(|m| m.to_string()).collect();
    assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);

    let tmp = tempdir().unwrap();
    let config = PipelineConfig {
        scratch_dir: tmp.path().join("temp_data"),
        profile_paths: Vec::new(),
        ..PipelineConfig::default()
    };
    let mut host = FakeHost {
        missing: "2024-02".parse().unwrap(),
        requested: Vec::new(),
    };
    let mut warehouse = FakeWarehouse::default();

    let summary = pipeline::run(&config, &months, &mut host, &mut warehouse)
        .await
        .unwrap();

    // 2024-03 is never requested
    assert_eq!(host.requested, months[..2].to_vec());
    assert_eq!(summary.stopped_at, Some(months[1]));
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].state, MonthState::Ingested);
    assert_eq!(
        summary.reports[1].outcome,
        MonthOutcome::NotPublished { status: 404 }
    );

    match warehouse.statements.as_slice() {
        [LoadStatement::Put { local_path, stage }, LoadStatement::CopyInto {
            table,
            stage: copy_stage,
            file_name,
        }] => {
            assert!(local_path.ends_with("yellow_tripdata_2024-01.parquet"));
            assert_eq!(stage, "RAW.MY_INTERNAL_STAGE");
            assert_eq!(copy_stage, "RAW.MY_INTERNAL_STAGE");
            assert_eq!(table, "RAW.yellow_taxi_trips");
            assert_eq!(file_name, "yellow_tripdata_2024-01.parquet");
        }
        other => panic!("unexpected statements: {other:?}"),
    }

    assert_eq!(warehouse.opened, 1);
    assert_eq!(warehouse.closed, 1);
    assert!(!config.scratch_dir.exists());
}
