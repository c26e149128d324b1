//! Chunked parallel transfer engine.
//!
//! Splits a file into fixed-size byte ranges, runs a bounded pool of
//! workers over them, and re-queues failed ranges until every range has
//! succeeded or one has exhausted its retry budget. The engine knows
//! nothing about HTTP: callers plug the per-range work in through
//! [`RangeTransfer`].
//!
//! Ranges are half-open (`[start, end)`) and numbered from 1 in every
//! direction; [`TransferRange::http_range`] renders the inclusive form an
//! HTTP `Range` header needs.

mod file_io;
mod pool;
mod range;
mod retry;

pub use file_io::{RangeReader, RangeWriter};
pub use pool::{
    CompletedRange, PoolConfig, RangeTransfer, TransferEvent, TransferFuture, TransferPool,
    TransferReport,
};
pub use range::{CompletionTag, TransferRange, part_count, plan};
pub use retry::RetryPolicy;

/// Default part size: 10 MiB.
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of concurrent part uploads.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

/// Default number of concurrent ranged downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 16;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single attempt at one range failed; the pool may retry it.
    #[error("range transfer failed: {0}")]
    Transfer(String),

    #[error("range {sequence} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        sequence: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("transfer worker panicked")]
    WorkerPanicked,

    #[error("worker pool stopped before the transfer completed")]
    PoolStopped,
}
