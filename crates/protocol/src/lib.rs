//! Wire types for the Seven Bridges platform REST API.
//!
//! Every request and response body exchanged with the platform is modelled
//! here as a plain serde struct. This crate performs no I/O.

pub mod download;
pub mod error;
pub mod page;
pub mod resources;
pub mod timestamp;
pub mod upload;

// Re-export primary types for convenience.
pub use download::DownloadInfo;
pub use error::ErrorInfo;
pub use page::{Link, ListOptions, PageEnvelope};
pub use resources::{File, Member, Metadata, Permissions, Project, ProjectCreate, User};
pub use upload::{
    MultipartUpload, PartGrant, PartReport, UploadInitRequest, UploadInitResponse,
};
