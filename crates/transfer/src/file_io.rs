use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::TransferError;
use crate::range::TransferRange;

// ---------------------------------------------------------------------------
// RangeReader
// ---------------------------------------------------------------------------

/// Reads byte ranges of a local file.
///
/// Every read opens its own handle, so concurrent workers never share a
/// file cursor.
#[derive(Debug, Clone)]
pub struct RangeReader {
    path: PathBuf,
    size: u64,
}

impl RangeReader {
    /// Checks that `path` is a readable regular file and records its size.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size at the time the reader was opened.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads exactly the bytes of `range`.
    pub fn read_range(&self, range: &TransferRange) -> Result<Vec<u8>, TransferError> {
        let len = usize::try_from(range.len()).map_err(|_| {
            TransferError::Transfer(format!("range {} too large to buffer", range.sequence))
        })?;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Async wrapper around [`read_range`](Self::read_range) that keeps the
    /// blocking read off the runtime threads.
    pub async fn read(&self, range: &TransferRange) -> Result<Vec<u8>, TransferError> {
        let reader = self.clone();
        let range = range.clone();
        tokio::task::spawn_blocking(move || reader.read_range(&range))
            .await
            .map_err(|e| TransferError::Transfer(format!("read task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// RangeWriter
// ---------------------------------------------------------------------------

/// Writes byte ranges into a pre-sized destination file.
///
/// Writes are positional, so any number of clones may write disjoint
/// ranges concurrently and in any order.
#[derive(Debug, Clone)]
pub struct RangeWriter {
    file: Arc<File>,
    path: PathBuf,
    size: u64,
}

impl RangeWriter {
    /// Creates (or truncates) `path` and extends it to `size` bytes.
    ///
    /// Missing parent directories are created.
    pub fn create(path: &Path, size: u64) -> Result<Self, TransferError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Writes `data` starting at `offset`.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), TransferError> {
        let end = offset.saturating_add(data.len() as u64);
        if end > self.size {
            return Err(TransferError::Transfer(format!(
                "write of {} bytes at offset {offset} exceeds file size {}",
                data.len(),
                self.size
            )));
        }
        write_all_at(&self.file, data, offset)?;
        Ok(())
    }

    /// Async wrapper around [`write_at`](Self::write_at).
    pub async fn write(&self, offset: u64, data: Vec<u8>) -> Result<(), TransferError> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_at(offset, &data))
            .await
            .map_err(|e| TransferError::Transfer(format!("write task failed: {e}")))?
    }

    /// Flushes file data to disk.
    pub fn sync(&self) -> Result<(), TransferError> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        let n = file.seek_write(data, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}
