// src/testing.rs
//! In-memory stand-ins for the source and the warehouse, used by unit tests.

use async_trait::async_trait;
use parquet::{
    data_type::Int64Type,
    file::{properties::WriterProperties, writer::SerializedFileWriter},
    schema::parser::parse_message_type,
};
use std::{collections::HashMap, io, path::Path, sync::Arc};

use crate::fetch::{FetchError, FetchOutcome, ScratchFile, Source};
use crate::months::MonthId;
use crate::warehouse::{LoadStatement, Warehouse, WarehouseError};

/// A single-column Parquet file holding `values`.
pub fn tiny_parquet(values: &[i64]) -> Vec<u8> {
    let schema =
        Arc::new(parse_message_type("message trips { REQUIRED INT64 passenger_count; }").unwrap());
    let props = Arc::new(WriterProperties::builder().build());

    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, props).unwrap();
    let mut row_group = writer.next_row_group().unwrap();
    while let Some(mut column) = row_group.next_column().unwrap() {
        column
            .typed::<Int64Type>()
            .write_batch(values, None, None)
            .unwrap();
        column.close().unwrap();
    }
    row_group.close().unwrap();
    writer.close().unwrap();
    buf
}

#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    NotPublished(u16),
    Unreachable,
    Panic,
}

/// Serves a small Parquet file for every month unless told otherwise.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: HashMap<MonthId, Scripted>,
    pub calls: Vec<MonthId>,
    /// Record how many entries the destination directory held at fetch time.
    pub on_fetch_inspect_dir: bool,
    pub dir_entries_seen: Vec<usize>,
}

impl ScriptedSource {
    pub fn script(mut self, month: MonthId, behaviour: Scripted) -> Self {
        self.script.insert(month, behaviour);
        self
    }
}

#[async_trait]
impl Source for ScriptedSource {
    async fn fetch(&mut self, month: MonthId, dest: &Path) -> FetchOutcome {
        self.calls.push(month);
        if self.on_fetch_inspect_dir {
            let dir = dest.parent().unwrap();
            self.dir_entries_seen
                .push(std::fs::read_dir(dir).unwrap().count());
        }

        match self.script.get(&month) {
            Some(Scripted::NotPublished(status)) => FetchOutcome::NotPublished { status: *status },
            Some(Scripted::Unreachable) => FetchOutcome::Unreachable(FetchError::Write {
                path: dest.to_path_buf(),
                source: io::Error::new(io::ErrorKind::TimedOut, "operation timed out"),
            }),
            Some(Scripted::Panic) => panic!("scripted panic for {month}"),
            None => {
                let body = tiny_parquet(&[1, 2, 3]);
                std::fs::write(dest, &body).unwrap();
                FetchOutcome::Downloaded(ScratchFile {
                    month,
                    path: dest.to_path_buf(),
                    bytes: body.len() as u64,
                    rows: Some(3),
                })
            }
        }
    }
}

/// Records every statement, optionally failing those that mention a file.
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    fail_open: bool,
    fail_upload: Vec<String>,
    fail_ingest: Vec<String>,
    last_put: Option<std::path::PathBuf>,
    pub executed: Vec<String>,
    pub open_calls: usize,
    pub close_calls: usize,
    /// For each COPY, whether the file of the preceding PUT still existed.
    pub local_file_present_at_copy: Vec<bool>,
}

impl RecordingWarehouse {
    /// Reject the login, as bad credentials would.
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn fail_upload(mut self, file_name: &str) -> Self {
        self.fail_upload.push(file_name.to_string());
        self
    }

    pub fn fail_ingest(mut self, file_name: &str) -> Self {
        self.fail_ingest.push(file_name.to_string());
        self
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn open(&mut self) -> Result<(), WarehouseError> {
        self.open_calls += 1;
        if self.fail_open {
            return Err(WarehouseError::Failed {
                step: "connect",
                status: Some(1),
                details: "Incorrect username or password was specified.".to_string(),
            });
        }
        Ok(())
    }

    async fn execute(&mut self, statement: &LoadStatement) -> Result<(), WarehouseError> {
        if self.close_calls > 0 {
            return Err(WarehouseError::Closed);
        }
        let sql = statement.to_string();
        self.executed.push(sql.clone());

        let failing = match statement {
            LoadStatement::Put { local_path, .. } => {
                self.last_put = Some(local_path.clone());
                &self.fail_upload
            }
            LoadStatement::CopyInto { .. } => {
                let present = self.last_put.as_ref().is_some_and(|p| p.exists());
                self.local_file_present_at_copy.push(present);
                &self.fail_ingest
            }
        };

        if failing.iter().any(|f| sql.contains(f.as_str())) {
            return Err(WarehouseError::Failed {
                step: statement.step(),
                status: Some(1),
                details: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        self.close_calls += 1;
        Ok(())
    }
}
