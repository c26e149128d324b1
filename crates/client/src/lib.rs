//! Async client for the Seven Bridges platform REST API.
//!
//! [`SevenBridges`] groups the endpoints into services: users, files,
//! projects, uploads and downloads. Uploads and downloads split files into
//! byte ranges and move them in parallel through the `sbg-transfer`
//! engine, retrying failed ranges individually.
//!
//! ```no_run
//! # async fn run() -> Result<(), sbg_client::ClientError> {
//! use sbg_client::{ClientConfig, SevenBridges, UploadInfo};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = SevenBridges::new(ClientConfig::new(
//!     "https://api.sbgenomics.com/v2",
//!     "my-token",
//! ))?;
//! let (me, _) = client.users().me().await?;
//! let info = UploadInfo::new("reads.fastq", format!("{}/demo", me.username));
//! client.uploads().upload(&info, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod response;
pub mod services;

#[cfg(test)]
mod testing;

pub use client::SevenBridges;
pub use config::{ClientConfig, TransferSettings};
pub use error::ClientError;
pub use executor::{ApiRequest, ApiResponse, HttpExecutor, RequestBody, StreamResponse, Target};
pub use http::ReqwestExecutor;
pub use response::{Page, Rate, Response};
pub use services::download::{DownloadSummary, Downloads};
pub use services::files::Files;
pub use services::projects::Projects;
pub use services::upload::{UploadInfo, UploadSummary, Uploads};
pub use services::users::Users;

pub use sbg_transfer::{TransferEvent, TransferReport};
