use serde::{Deserialize, Serialize};

/// Response of `GET /files/{id}/download_info`: a pre-signed storage URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub url: String,
}
