//! Upload storage
//!
//! Uploaded sources are written to one directory under a unique name,
//! `<uuid>-<client file name>`. The stored name doubles as the playback
//! identifier handed back to the uploader.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

/// Directory of stored uploads
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the uploads live in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it is missing
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Unique stored name for a client-supplied file name
    pub fn stored_name(file_name: &str) -> String {
        format!("{}-{}", Uuid::new_v4(), sanitize(file_name))
    }

    /// Full path of a stored upload
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create a new, empty file for an upload
    ///
    /// Returns the stored name and the open file.
    pub async fn create(&self, file_name: &str) -> io::Result<(String, tokio::fs::File)> {
        let name = Self::stored_name(file_name);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(&name))
            .await?;
        Ok((name, file))
    }

    /// Delete a stored upload, ignoring a missing file
    pub async fn discard(&self, name: &str) {
        if let Err(e) = tokio::fs::remove_file(self.path_of(name)).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(name, error = %e, "Failed to discard upload");
            }
        }
    }

    /// Most recently modified stored upload, if any
    pub async fn latest(&self) -> io::Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || metadata.len() == 0 {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            match &newest {
                Some((at, _)) if modified <= *at => {}
                _ => newest = Some((modified, entry.path())),
            }
        }

        Ok(newest.map(|(_, path)| path))
    }
}

/// Keep only the final path component and a conservative character set
fn sanitize(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
