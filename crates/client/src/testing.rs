//! In-memory [`HttpExecutor`] for driver and service tests.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ClientError;
use crate::executor::{ApiRequest, ApiResponse, ExecFuture, HttpExecutor, StreamResponse};

/// Canned answer produced by a [`MockExecutor`] handler.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Reply {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(value.to_string()),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn bytes(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }
}

type Handler = dyn Fn(&ApiRequest) -> Result<Reply, ClientError> + Send + Sync;

/// Records every request and answers it through a handler closure.
///
/// Status handling mirrors the reqwest executor: non-2xx answers to API
/// paths become [`ClientError::Api`], and `stream` rejects any non-2xx.
pub(crate) struct MockExecutor {
    handler: Box<Handler>,
    requests: Mutex<Vec<ApiRequest>>,
    /// Streamed bodies are split into chunks of this size.
    chunk_size: usize,
}

impl MockExecutor {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<Reply, ClientError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            chunk_size: 3,
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests matching `pred`.
    pub fn count(&self, pred: impl Fn(&ApiRequest) -> bool) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| pred(r)).count()
    }

    fn answer(&self, request: &ApiRequest) -> Result<Reply, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

impl HttpExecutor for MockExecutor {
    fn execute(&self, request: ApiRequest) -> ExecFuture<'_, ApiResponse> {
        Box::pin(async move {
            let reply = self.answer(&request)?;
            if request.target.is_path() && !(200..300).contains(&reply.status) {
                return Err(ClientError::api(reply.status, &reply.body));
            }
            Ok(ApiResponse {
                status: reply.status,
                headers: reply.header_map(),
                body: reply.body,
            })
        })
    }

    fn stream(&self, request: ApiRequest) -> ExecFuture<'_, StreamResponse> {
        Box::pin(async move {
            let reply = self.answer(&request)?;
            if !(200..300).contains(&reply.status) {
                return Err(ClientError::api(reply.status, &reply.body));
            }
            let mut headers = reply.header_map();
            if !headers.contains_key(reqwest::header::CONTENT_LENGTH) {
                headers.insert(
                    reqwest::header::CONTENT_LENGTH,
                    HeaderValue::from(reply.body.len() as u64),
                );
            }
            let chunks: Vec<Result<Bytes, ClientError>> = reply
                .body
                .chunks(self.chunk_size)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            Ok(StreamResponse {
                status: reply.status,
                headers,
                body: Box::pin(futures_util::stream::iter(chunks)),
            })
        })
    }
}
