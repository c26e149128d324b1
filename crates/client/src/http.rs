//! [`HttpExecutor`] backed by `reqwest`.

use futures_util::TryStreamExt;
use reqwest::header::{HeaderName, HeaderValue};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::executor::{
    ApiRequest, ApiResponse, ExecFuture, HttpExecutor, RequestBody, StreamResponse, Target,
};

pub(crate) const HEADER_AUTH_TOKEN: &str = "X-Sbg-Auth-Token";

/// Production executor.
///
/// API paths are resolved against the configured base URL and carry the
/// auth token. Absolute URLs are sent as-is, without it.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    http: reqwest::Client,
    base_url: String,
    token: Option<HeaderValue>,
}

impl ReqwestExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let token = if config.token.is_empty() {
            None
        } else {
            let mut value = HeaderValue::from_str(&config.token)
                .map_err(|_| ClientError::InvalidHeader(HEADER_AUTH_TOKEN.into()))?;
            value.set_sensitive(true);
            Some(value)
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn build(&self, request: ApiRequest) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = match &request.target {
            Target::Path(path) => {
                let sep = if path.starts_with('/') { "" } else { "/" };
                format!("{}{sep}{path}", self.base_url)
            }
            Target::Url(url) => url.clone(),
        };
        trace!(method = %request.method, %url, "sending request");

        let mut builder = self.http.request(request.method, &url);
        if request.target.is_path()
            && let Some(token) = &self.token
        {
            builder = builder.header(HEADER_AUTH_TOKEN, token.clone());
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes(bytes) => builder.body(bytes),
        };
        Ok(builder)
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: ApiRequest) -> ExecFuture<'_, ApiResponse> {
        Box::pin(async move {
            let is_path = request.target.is_path();
            let resp = self.build(request)?.send().await?;
            let status = resp.status().as_u16();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?;

            if is_path && !(200..300).contains(&status) {
                debug!(status, "API request failed");
                return Err(ClientError::api(status, &body));
            }
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }

    fn stream(&self, request: ApiRequest) -> ExecFuture<'_, StreamResponse> {
        Box::pin(async move {
            let resp = self.build(request)?.send().await?;
            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let body = resp.bytes().await.unwrap_or_default();
                debug!(status, "streamed request failed");
                return Err(ClientError::api(status, &body));
            }
            let headers = resp.headers().clone();
            let body = resp.bytes_stream().map_err(ClientError::Http);
            Ok(StreamResponse {
                status,
                headers,
                body: Box::pin(body),
            })
        })
    }
}
