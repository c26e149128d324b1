//! Parallel ranged download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use sbg_protocol::DownloadInfo;
use sbg_transfer::{
    RangeTransfer, RangeWriter, TransferError, TransferEvent, TransferFuture, TransferPool,
    TransferRange, TransferReport, plan,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{fetch, segment, unless_cancelled};
use crate::config::TransferSettings;
use crate::error::{ClientError, from_transfer};
use crate::executor::{ApiRequest, HttpExecutor};
use crate::response::Response;

/// Bytes buffered per range before they are written out.
const WRITE_BUFFER: usize = 1024 * 1024;

/// Result of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub destination: PathBuf,
    pub size: u64,
    pub report: TransferReport,
}

/// File downloads.
pub struct Downloads {
    executor: Arc<dyn HttpExecutor>,
    settings: TransferSettings,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl Downloads {
    pub(crate) fn new(executor: Arc<dyn HttpExecutor>, settings: TransferSettings) -> Self {
        Self {
            executor,
            settings,
            events: None,
        }
    }

    /// Reports per-range progress on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Resolves the storage URL a file can be fetched from.
    pub async fn info(&self, file_id: &str) -> Result<(DownloadInfo, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::get(format!("/files/{}/download_info", segment(file_id))),
        )
        .await
    }

    /// Downloads `file_id` into `destination`, creating or truncating it.
    ///
    /// The file is complete when this returns `Ok`. On error it is left
    /// partially written, unless `cancel` fired before any byte was
    /// fetched, in which case an existing destination is left untouched.
    pub async fn download(
        &self,
        file_id: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadSummary, ClientError> {
        let part_size = self.settings.part_size()?;
        let pool_config = self.settings.pool_config()?;

        let (info, _) = unless_cancelled(cancel, self.info(file_id)).await?;
        let size = unless_cancelled(cancel, self.probe_size(&info.url)).await?;
        // Creating the writer truncates an existing destination.
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let writer = RangeWriter::create(destination, size).map_err(from_transfer)?;
        info!(
            file_id,
            size,
            destination = %destination.display(),
            "download started"
        );

        let ranges = plan(size, part_size);
        let fetcher = Arc::new(RangeFetcher {
            executor: Arc::clone(&self.executor),
            url: info.url,
            writer: writer.clone(),
            total: size,
        });
        let mut pool = TransferPool::new(pool_config);
        if let Some(events) = &self.events {
            pool = pool.with_events(events.clone());
        }

        let report = pool.run(ranges, fetcher, cancel).await.map_err(|e| {
            error!(file_id, error = %e, "download failed");
            from_transfer(e)
        })?;

        tokio::task::spawn_blocking(move || writer.sync())
            .await
            .map_err(|e| ClientError::Transfer(TransferError::Transfer(e.to_string())))??;

        info!(file_id, size, "download complete");
        Ok(DownloadSummary {
            destination: destination.to_path_buf(),
            size,
            report,
        })
    }

    /// Length of the resource behind `url`, read from the headers of a
    /// plain `GET` whose body is then dropped unread.
    async fn probe_size(&self, url: &str) -> Result<u64, ClientError> {
        let resp = self.executor.stream(ApiRequest::get_url(url)).await?;
        let size = resp.content_length().ok_or(ClientError::MissingContentLength)?;
        debug!(size, "probed remote size");
        Ok(size)
    }
}

/// Fetches single ranges of one remote file into the destination.
struct RangeFetcher {
    executor: Arc<dyn HttpExecutor>,
    url: String,
    writer: RangeWriter,
    total: u64,
}

impl RangeFetcher {
    async fn fetch_range(&self, range: &TransferRange) -> Result<(), ClientError> {
        let request = ApiRequest::get_url(self.url.as_str()).header("Range", range.http_range());
        let mut resp = self.executor.stream(request).await?;

        // A plain 200 carries the whole file, which is only what we asked
        // for when the range spans it.
        let whole = range.start == 0 && range.end == self.total;
        if resp.status != 206 && !(resp.status == 200 && whole) {
            return Err(ClientError::UnexpectedStatus {
                status: resp.status,
                expected: vec![206],
            });
        }

        let mut offset = range.start;
        let mut buf: Vec<u8> = Vec::with_capacity(WRITE_BUFFER.min(range.len() as usize));
        while let Some(chunk) = resp.body.next().await {
            let chunk = chunk?;
            if offset + (buf.len() + chunk.len()) as u64 > range.end {
                return Err(ClientError::Transfer(TransferError::Transfer(format!(
                    "range {} received more than {} bytes",
                    range.sequence,
                    range.len()
                ))));
            }
            buf.extend_from_slice(&chunk);
            if buf.len() >= WRITE_BUFFER {
                let full = std::mem::replace(&mut buf, Vec::with_capacity(WRITE_BUFFER));
                let len = full.len() as u64;
                self.writer.write(offset, full).await?;
                offset += len;
            }
        }
        if !buf.is_empty() {
            let len = buf.len() as u64;
            self.writer.write(offset, buf).await?;
            offset += len;
        }

        if offset != range.end {
            return Err(ClientError::Transfer(TransferError::Transfer(format!(
                "range {} ended after {} of {} bytes",
                range.sequence,
                offset - range.start,
                range.len()
            ))));
        }
        Ok(())
    }
}

impl RangeTransfer for RangeFetcher {
    fn transfer<'a>(&'a self, range: &'a TransferRange) -> TransferFuture<'a> {
        Box::pin(async move {
            self.fetch_range(range)
                .await
                .map(|()| None)
                .map_err(|e| TransferError::Transfer(e.to_string()))
        })
    }
}
