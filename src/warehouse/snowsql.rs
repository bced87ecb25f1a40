use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{LoadStatement, Warehouse, WarehouseError};
use crate::credentials::ConnectionDescriptor;

pub const DEFAULT_PROGRAM: &str = "snowsql";

const CONNECT_STEP: &str = "connect";
/// Round trip that fails on bad credentials or an unreachable account.
const CONNECT_CHECK: &str = "SELECT 1";

/// Runs each statement through the `snowsql` CLI, which handles both the
/// client-side `PUT` upload and `COPY INTO`. Each statement is its own
/// snowsql session; the password travels in `SNOWSQL_PWD`, never argv.
pub struct SnowSqlWarehouse {
    program: String,
    launcher_args: Vec<String>,
    descriptor: ConnectionDescriptor,
    closed: bool,
}

impl std::fmt::Debug for SnowSqlWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowSqlWarehouse")
            .field("program", &self.program)
            .field("account", &self.descriptor.account)
            .field("closed", &self.closed)
            .finish()
    }
}

impl SnowSqlWarehouse {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            launcher_args: Vec::new(),
            descriptor,
            closed: false,
        }
    }

    /// Use another snowsql binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run snowsql through a launcher, e.g. `docker run ... snowsql` or
    /// `sh wrapper.sh`: `program` is started with `args` before the snowsql flags.
    pub fn with_launcher(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.launcher_args = args;
        self
    }

    fn command(&self, sql: &str) -> Command {
        let d = &self.descriptor;
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.launcher_args)
            .args(["-a", d.account.as_str()])
            .args(["-u", d.user.as_str()])
            .args(["-d", d.database.as_str()])
            .args(["-s", d.schema.as_str()])
            .args(["-w", d.warehouse.as_str()])
            .args(["-r", d.role.as_str()])
            .args(["-q", sql])
            .args(["-o", "exit_on_error=true"])
            .args(["-o", "friendly=false"])
            .args(["-o", "quiet=true"])
            .args(["-o", "timing=false"])
            .args(["-o", "output_format=plain"])
            .env("SNOWSQL_PWD", &d.password)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn run_sql(&self, step: &'static str, sql: &str) -> Result<(), WarehouseError> {
        debug!(step, %sql, "executing");

        let output = self
            .command(sql)
            .output()
            .await
            .map_err(|source| WarehouseError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let details = match (stderr.is_empty(), stdout.is_empty()) {
                (false, _) => stderr,
                (true, false) => stdout,
                (true, true) => "Unknown error".to_string(),
            };
            return Err(WarehouseError::Failed {
                step,
                status: output.status.code(),
                details,
            });
        }

        if !stdout.is_empty() {
            debug!(step, output = %stdout, "statement output");
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for SnowSqlWarehouse {
    async fn open(&mut self) -> Result<(), WarehouseError> {
        if self.closed {
            return Err(WarehouseError::Closed);
        }
        self.run_sql(CONNECT_STEP, CONNECT_CHECK).await?;
        debug!(account = %self.descriptor.account, "warehouse session ready");
        Ok(())
    }

    async fn execute(&mut self, statement: &LoadStatement) -> Result<(), WarehouseError> {
        if self.closed {
            return Err(WarehouseError::Closed);
        }
        self.run_sql(statement.step(), &statement.to_string()).await
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        self.closed = true;
        Ok(())
    }
}
