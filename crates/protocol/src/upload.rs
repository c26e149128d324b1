use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Body of `POST /upload/multipart`.
///
/// The overwrite flag travels as a query parameter, not in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInitRequest {
    pub project: String,
    pub name: String,
    pub part_size: u64,
    pub size: u64,
}

/// Session created by `POST /upload/multipart`.
///
/// `part_size` is authoritative: the server may override the size the
/// client suggested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInitResponse {
    pub upload_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub part_size: u64,
    #[serde(default)]
    pub parallel_uploads: bool,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub project: String,
}

/// An upload still registered server-side (`GET /upload/multipart`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub upload_id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initiated: String,
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// Single-use authorization to transfer one part, returned by
/// `GET /upload/multipart/{upload_id}/part/{part_number}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartGrant {
    pub method: String,
    pub url: String,
    #[serde(default, with = "crate::timestamp")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub headers: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub success_codes: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
}

impl PartGrant {
    /// Header pairs the transfer request must carry.
    ///
    /// String values are used verbatim; any other JSON value is sent in its
    /// JSON text form.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Returns `true` if `status` counts as a successful transfer.
    ///
    /// An empty `success_codes` list falls back to any 2xx status.
    pub fn is_success(&self, status: u16) -> bool {
        if self.success_codes.is_empty() {
            (200..300).contains(&status)
        } else {
            self.success_codes.contains(&status)
        }
    }
}

/// Body of `POST /upload/multipart/{upload_id}/part`, acknowledging one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReport {
    pub part_number: u64,
    pub response: PartReportResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReportResponse {
    pub headers: PartReportHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReportHeaders {
    #[serde(rename = "ETag")]
    pub etag: String,
}

impl PartReport {
    pub fn new(part_number: u64, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            response: PartReportResponse {
                headers: PartReportHeaders { etag: etag.into() },
            },
        }
    }
}
