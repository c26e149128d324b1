use serde::{Deserialize, Serialize};

/// Error envelope returned by the platform for non-2xx responses.
///
/// All fields are optional on the wire; an empty envelope means the server
/// sent no structured detail (for example a proxy-generated error page).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub more_info: String,
}

impl ErrorInfo {
    /// Returns `true` if the envelope carries no useful detail.
    pub fn is_empty(&self) -> bool {
        self.code == 0 && self.message.is_empty() && self.more_info.is_empty()
    }
}
