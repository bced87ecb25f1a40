use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use std::{path::Path, time::Duration};
use tokio::{fs, io::AsyncWriteExt, time};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{inspect, FetchError, FetchOutcome, ScratchFile, Source};
use crate::config::{self, ConfigError, DEFAULT_PROGRESS_EVERY_BYTES, DEFAULT_STALL_TIMEOUT};
use crate::months::{MonthId, ANCHOR};

/// Downloads monthly files from a URL template such as
/// `https://host/trip-data/yellow_tripdata_{month}.parquet`.
///
/// There is no deadline on the whole transfer: a download fails only if the
/// connection cannot be made or the server goes quiet for `stall_timeout`.
pub struct HttpSource {
    client: Client,
    template: String,
    stall_timeout: Duration,
    progress_every: u64,
}

impl HttpSource {
    /// Fails early if `template` cannot produce a URL.
    pub fn new(template: &str, connect_timeout: Duration) -> Result<Self, FetchError> {
        config::source_url(template, ANCHOR)?;
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            template: template.to_string(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            progress_every: DEFAULT_PROGRESS_EVERY_BYTES,
        })
    }

    /// Longest wait for the response headers or the next body chunk.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Emit a progress line every `bytes` downloaded.
    pub fn with_progress_every(mut self, bytes: u64) -> Self {
        self.progress_every = bytes.max(1);
        self
    }

    pub fn url_for(&self, month: MonthId) -> Result<Url, ConfigError> {
        config::source_url(&self.template, month)
    }

    /// Stream the body into `dest` chunk by chunk. Returns bytes written.
    async fn write_body(&self, resp: Response, dest: &Path) -> Result<u64, FetchError> {
        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(dest).await.map_err(write_err)?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        let mut next_report = self.progress_every;

        while let Some(chunk) = time::timeout(self.stall_timeout, stream.next())
            .await
            .map_err(|_| FetchError::Stalled {
                after: self.stall_timeout,
            })?
        {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;

            if written >= next_report {
                debug!(mb = written / (1024 * 1024), "download progress");
                next_report += self.progress_every;
            }
        }
        file.flush().await.map_err(write_err)?;
        Ok(written)
    }

    async fn discard(dest: &Path) {
        if let Err(e) = fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dest.display(), error = %e, "could not remove partial download");
            }
        }
    }
}

#[async_trait]
impl Source for HttpSource {
    #[instrument(level = "debug", skip_all, fields(month = %month))]
    async fn fetch(&mut self, month: MonthId, dest: &Path) -> FetchOutcome {
        let url = match self.url_for(month) {
            Ok(u) => u,
            Err(e) => return FetchOutcome::Unreachable(e.into()),
        };

        debug!(%url, "GET");
        let resp = match time::timeout(self.stall_timeout, self.client.get(url).send()).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return FetchOutcome::Unreachable(e.into()),
            Err(_) => {
                return FetchOutcome::Unreachable(FetchError::Stalled {
                    after: self.stall_timeout,
                })
            }
        };

        let status = resp.status();
        if status != StatusCode::OK {
            return FetchOutcome::NotPublished {
                status: status.as_u16(),
            };
        }

        let bytes = match self.write_body(resp, dest).await {
            Ok(n) => n,
            Err(e) => {
                Self::discard(dest).await;
                return FetchOutcome::Unreachable(e);
            }
        };

        match inspect::summarize(dest) {
            Ok(summary) => FetchOutcome::Downloaded(ScratchFile {
                month,
                path: dest.to_path_buf(),
                bytes,
                rows: Some(summary.rows),
            }),
            Err(source) => {
                Self::discard(dest).await;
                FetchOutcome::Unreachable(FetchError::InvalidParquet {
                    path: dest.to_path_buf(),
                    source,
                })
            }
        }
    }
}
