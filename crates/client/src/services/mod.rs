//! Endpoint groups of the platform API.

pub mod download;
pub mod files;
pub mod projects;
pub mod upload;
pub mod users;

use std::future::Future;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use sbg_protocol::PageEnvelope;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::executor::{ApiRequest, HttpExecutor};
use crate::response::Response;

/// Characters escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escapes an identifier for use as one path segment.
pub(crate) fn segment(id: &str) -> String {
    utf8_percent_encode(id, SEGMENT).to_string()
}

/// Escapes a project ID (`owner/project`), keeping its slash.
pub(crate) fn project_path(project_id: &str) -> String {
    project_id
        .split('/')
        .map(segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Sends `request` and decodes the JSON body.
pub(crate) async fn fetch<T: DeserializeOwned>(
    executor: &dyn HttpExecutor,
    request: ApiRequest,
) -> Result<(T, Response), ClientError> {
    let resp = executor.execute(request).await?;
    let value = resp.json()?;
    Ok((value, resp.meta()))
}

/// Sends `request` and decodes the `items` of a paginated body.
pub(crate) async fn fetch_page<T: DeserializeOwned>(
    executor: &dyn HttpExecutor,
    request: ApiRequest,
) -> Result<(Vec<T>, Response), ClientError> {
    let (page, meta): (PageEnvelope<T>, Response) = fetch(executor, request).await?;
    Ok((page.items, meta))
}

/// Sends `request`, ignoring any body.
pub(crate) async fn send(
    executor: &dyn HttpExecutor,
    request: ApiRequest,
) -> Result<Response, ClientError> {
    let resp = executor.execute(request).await?;
    Ok(resp.meta())
}

/// Runs `step` unless `cancel` has fired, abandoning it if `cancel` fires
/// first. A token that is already cancelled never starts the step.
pub(crate) async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = step => result,
    }
}
