//! Multipart upload.
//!
//! An upload runs as one session: init, parallel part transfers, finalize.
//! Each part goes through negotiate, read, transfer and acknowledge; the
//! first failing step fails the whole attempt and the pool retries the
//! part from the start with a fresh grant.

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Method;
use sbg_protocol::{
    ListOptions, MultipartUpload, PartGrant, PartReport, UploadInitRequest, UploadInitResponse,
};
use sbg_transfer::{
    CompletionTag, RangeReader, RangeTransfer, TransferError, TransferEvent, TransferFuture,
    TransferPool, TransferRange, TransferReport, plan,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{fetch, fetch_page, segment, send, unless_cancelled};
use crate::config::TransferSettings;
use crate::error::{ClientError, from_transfer};
use crate::executor::{ApiRequest, HttpExecutor, Target};
use crate::response::Response;

/// What to upload and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    /// Local file to read.
    pub path: PathBuf,
    /// Remote name; defaults to the file name of `path`.
    pub name: Option<String>,
    /// Replace an existing remote file of the same name.
    pub overwrite: bool,
    /// Destination project ID (`owner/project`).
    pub project: String,
}

impl UploadInfo {
    pub fn new(path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            overwrite: false,
            project: project.into(),
        }
    }

    fn remote_name(&self) -> Result<String, ClientError> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        default_remote_name(&self.path).ok_or_else(|| {
            ClientError::InvalidConfig(format!(
                "cannot derive a remote name from {}",
                self.path.display()
            ))
        })
    }
}

/// Result of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub upload_id: String,
    pub name: String,
    pub size: u64,
    /// Part size the server chose.
    pub part_size: u64,
    pub report: TransferReport,
}

/// Multipart upload sessions.
pub struct Uploads {
    executor: Arc<dyn HttpExecutor>,
    settings: TransferSettings,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl Uploads {
    pub(crate) fn new(executor: Arc<dyn HttpExecutor>, settings: TransferSettings) -> Self {
        Self {
            executor,
            settings,
            events: None,
        }
    }

    /// Reports per-part progress on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Uploads the file described by `info`.
    ///
    /// Returns only once every part is acknowledged and the session is
    /// finalized. On failure the session may stay registered server-side;
    /// see [`list`](Self::list) and [`abort`](Self::abort).
    pub async fn upload(
        &self,
        info: &UploadInfo,
        cancel: &CancellationToken,
    ) -> Result<UploadSummary, ClientError> {
        let reader = RangeReader::open(&info.path).map_err(from_transfer)?;
        let name = info.remote_name()?;
        let requested_part_size = self.settings.part_size()?;
        let pool_config = self.settings.pool_config()?;

        let session = unless_cancelled(
            cancel,
            self.init(info, &name, reader.size(), requested_part_size),
        )
        .await?;
        let part_size = NonZeroU64::new(session.part_size).unwrap_or_else(|| {
            warn!(
                upload_id = %session.upload_id,
                "server returned no part size, keeping the requested one"
            );
            requested_part_size
        });
        info!(
            upload_id = %session.upload_id,
            name = %name,
            size = reader.size(),
            part_size = part_size.get(),
            "upload session created"
        );

        let ranges = plan(reader.size(), part_size);
        let uploader = Arc::new(PartUploader {
            executor: Arc::clone(&self.executor),
            upload_id: session.upload_id.clone(),
            reader,
        });
        let mut pool = TransferPool::new(pool_config);
        if let Some(events) = &self.events {
            pool = pool.with_events(events.clone());
        }

        let report = pool
            .run(ranges, Arc::clone(&uploader), cancel)
            .await
            .map_err(|e| {
                error!(upload_id = %session.upload_id, error = %e, "part upload failed");
                from_transfer(e)
            })?;

        self.finalize(&session.upload_id, cancel).await?;

        Ok(UploadSummary {
            upload_id: session.upload_id,
            name,
            size: uploader.reader.size(),
            part_size: part_size.get(),
            report,
        })
    }

    /// Upload sessions still open for the current user.
    pub async fn list(
        &self,
        options: &ListOptions,
    ) -> Result<(Vec<MultipartUpload>, Response), ClientError> {
        let request = ApiRequest::get("/upload/multipart").queries(options.to_query());
        fetch_page(self.executor.as_ref(), request).await
    }

    /// Discards an open upload session and its uploaded parts.
    pub async fn abort(&self, upload_id: &str) -> Result<Response, ClientError> {
        let resp = send(
            self.executor.as_ref(),
            ApiRequest::delete(format!("/upload/multipart/{}", segment(upload_id))),
        )
        .await?;
        info!(upload_id, "upload aborted");
        Ok(resp)
    }

    async fn init(
        &self,
        info: &UploadInfo,
        name: &str,
        size: u64,
        part_size: NonZeroU64,
    ) -> Result<UploadInitResponse, ClientError> {
        let body = UploadInitRequest {
            project: info.project.clone(),
            name: name.to_string(),
            part_size: part_size.get(),
            size,
        };
        let request = ApiRequest::post("/upload/multipart")
            .query("overwrite", if info.overwrite { "true" } else { "false" })
            .json(&body)?;
        let (session, _) = fetch(self.executor.as_ref(), request).await?;
        Ok(session)
    }

    /// Completes the session, retrying with the part retry policy.
    async fn finalize(&self, upload_id: &str, cancel: &CancellationToken) -> Result<(), ClientError> {
        let policy = self.settings.retry_policy();
        let path = format!("/upload/multipart/{}/complete", segment(upload_id));
        let mut attempts = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            attempts += 1;
            let request = ApiRequest::post(path.as_str())
                .header("Content-Type", "application/json")
                .header("Accept", "application/json");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = send(self.executor.as_ref(), request) => result,
            };
            match result {
                Ok(_) => {
                    info!(upload_id, attempts, "upload finalized");
                    return Ok(());
                }
                Err(e) if policy.allows_retry(attempts) => {
                    let delay = policy.delay_for_attempt(attempts);
                    warn!(
                        upload_id,
                        attempt = attempts,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "finalize failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    error!(upload_id, attempts, error = %e, "finalize failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Uploads single parts of one session.
struct PartUploader {
    executor: Arc<dyn HttpExecutor>,
    upload_id: String,
    reader: RangeReader,
}

impl PartUploader {
    async fn upload_part(&self, range: &TransferRange) -> Result<CompletionTag, ClientError> {
        let grant = self.negotiate(range.sequence).await?;
        let data = self.reader.read(range).await?;
        let etag = self.send_part(&grant, data).await?;
        self.acknowledge(range.sequence, &etag).await?;
        debug!(
            upload_id = %self.upload_id,
            sequence = range.sequence,
            bytes = range.len(),
            "part acknowledged"
        );
        Ok(CompletionTag(etag))
    }

    async fn negotiate(&self, sequence: u64) -> Result<PartGrant, ClientError> {
        let path = format!(
            "/upload/multipart/{}/part/{sequence}",
            segment(&self.upload_id)
        );
        let (grant, _) = fetch(self.executor.as_ref(), ApiRequest::get(path)).await?;
        Ok(grant)
    }

    /// Performs the byte transfer the grant describes and returns the ETag.
    async fn send_part(&self, grant: &PartGrant, data: Vec<u8>) -> Result<String, ClientError> {
        let method = Method::from_bytes(grant.method.as_bytes())
            .map_err(|_| ClientError::InvalidHeader(format!("method {:?}", grant.method)))?;
        let mut request = ApiRequest::new(method, Target::Url(grant.url.clone())).bytes(data);
        for (name, value) in grant.header_pairs() {
            // The body length is set by the HTTP layer.
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            request = request.header(name, value);
        }

        let resp = self.executor.execute(request).await?;
        if !grant.is_success(resp.status) {
            return Err(ClientError::UnexpectedStatus {
                status: resp.status,
                expected: grant.success_codes.clone(),
            });
        }
        resp.header("ETag")
            .map(str::to_string)
            .ok_or(ClientError::MissingEtag)
    }

    async fn acknowledge(&self, sequence: u64, etag: &str) -> Result<(), ClientError> {
        let path = format!("/upload/multipart/{}/part", segment(&self.upload_id));
        let request = ApiRequest::post(path).json(&PartReport::new(sequence, etag))?;
        send(self.executor.as_ref(), request).await?;
        Ok(())
    }
}

impl RangeTransfer for PartUploader {
    fn transfer<'a>(&'a self, range: &'a TransferRange) -> TransferFuture<'a> {
        Box::pin(async move {
            self.upload_part(range)
                .await
                .map(Some)
                .map_err(|e| TransferError::Transfer(e.to_string()))
        })
    }
}

/// Name a file would get when uploaded without an explicit one.
pub fn default_remote_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
