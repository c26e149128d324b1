//! The seam between the services and the network.
//!
//! Services describe requests as plain [`ApiRequest`] values and hand them
//! to an [`HttpExecutor`]. The production executor is
//! [`ReqwestExecutor`](crate::http::ReqwestExecutor); tests substitute an
//! in-memory one.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::response::Response;

/// Boxed future returned by [`HttpExecutor`] methods.
pub type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Response body delivered chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Sends [`ApiRequest`]s.
///
/// Implementations must turn a non-2xx answer to a [`Target::Path`]
/// request into [`ClientError::Api`]. Answers to [`Target::Url`] requests
/// are returned whatever their status from [`execute`](Self::execute), so
/// callers can judge them against their own success codes.
pub trait HttpExecutor: Send + Sync {
    /// Sends the request and buffers the whole response body.
    fn execute(&self, request: ApiRequest) -> ExecFuture<'_, ApiResponse>;

    /// Sends the request and returns the body as a stream.
    ///
    /// Any non-2xx status is an error, whatever the target.
    fn stream(&self, request: ApiRequest) -> ExecFuture<'_, StreamResponse>;
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path relative to the API base URL; carries the auth token.
    Path(String),
    /// Absolute URL handed out by the platform (storage grants, download
    /// links). Never carries the auth token.
    Url(String),
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Path(p) | Target::Url(p) => p,
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Target::Path(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// A request described independently of any HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub target: Target,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, Target::Path(path.into()))
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, Target::Path(path.into()))
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, Target::Path(path.into()))
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, Target::Path(path.into()))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, Target::Path(path.into()))
    }

    /// `GET` against an absolute URL.
    pub fn get_url(url: impl Into<String>) -> Self {
        Self::new(Method::GET, Target::Url(url.into()))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn queries(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of `name` if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Rate and pagination metadata of this response.
    pub fn meta(&self) -> Response {
        Response::from_parts(self.status, &self.headers)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A response whose body has not been read yet.
pub struct StreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl StreamResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared body length from `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.header(reqwest::header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse().ok())
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
