use sbg_protocol::ErrorInfo;
use sbg_transfer::TransferError;

/// Errors from the Seven Bridges client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer from the platform API, with its decoded error envelope.
    #[error("HTTP {status}{detail}", detail = api_detail(.info))]
    Api { status: u16, info: ErrorInfo },

    /// A part transfer answered with a status the grant does not accept.
    #[error("unexpected status {status} (expected {expected:?})")]
    UnexpectedStatus { status: u16, expected: Vec<u16> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("response carries no usable Content-Length")]
    MissingContentLength,

    #[error("part upload response carries no ETag")]
    MissingEtag,

    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    /// Builds an [`ClientError::Api`] from a raw error response body.
    ///
    /// Bodies that are not a JSON error envelope (proxy pages, empty
    /// bodies) yield an envelope carrying only the status.
    pub fn api(status: u16, body: &[u8]) -> Self {
        let mut info: ErrorInfo = serde_json::from_slice(body).unwrap_or_default();
        if info.status == 0 {
            info.status = status;
        }
        Self::Api { status, info }
    }

    /// Returns `true` if this error stems from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Transfer(TransferError::Cancelled)
        )
    }

    /// Status code of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Lifts engine errors, keeping cancellation a first-class variant.
pub(crate) fn from_transfer(err: TransferError) -> ClientError {
    match err {
        TransferError::Cancelled => ClientError::Cancelled,
        other => ClientError::Transfer(other),
    }
}

fn api_detail(info: &ErrorInfo) -> String {
    if info.is_empty() {
        String::new()
    } else {
        format!(
            " [Code: {}, Message: {}, More info: {}]",
            info.code, info.message, info.more_info
        )
    }
}
