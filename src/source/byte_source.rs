//! Byte sources a paced source can read from
//!
//! A source must be openable, readable sequentially and rewindable, so the
//! paced loop can start over when it reaches the end.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek};

/// A reopenable sequential byte source
pub trait ByteSource: Send + Sync + 'static {
    /// Reader produced by [`open`](Self::open)
    type Reader: AsyncRead + AsyncSeek + Unpin + Send + 'static;

    /// Open the source positioned at its first byte
    fn open(&self) -> impl Future<Output = io::Result<Self::Reader>> + Send;

    /// Total size in bytes
    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send;

    /// Description used in logs and statistics
    fn label(&self) -> String;
}

/// A file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    type Reader = tokio::fs::File;

    async fn open(&self) -> io::Result<Self::Reader> {
        tokio::fs::File::open(&self.path).await
    }

    async fn size(&self) -> io::Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", self.path.display()),
            ));
        }
        Ok(metadata.len())
    }

    fn label(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// An in-memory buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    type Reader = io::Cursor<Bytes>;

    async fn open(&self) -> io::Result<Self::Reader> {
        Ok(io::Cursor::new(self.data.clone()))
    }

    async fn size(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
