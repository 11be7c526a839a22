//! Directory layout shared by both ends of the file channel.
//!
//! `request.json` is written by the client and consumed by the extension,
//! `response.json` is written by the extension and consumed by the client, and
//! `lock` exists while the extension is writing a response.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

pub const REQUEST_FILE: &str = "request.json";
pub const RESPONSE_FILE: &str = "response.json";
pub const LOCK_FILE: &str = "lock";

#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join(REQUEST_FILE)
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(RESPONSE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    pub async fn is_locked(&self) -> bool {
        tokio::fs::try_exists(self.lock_path()).await.unwrap_or(false)
    }

    pub async fn lock(&self) -> std::io::Result<()> {
        tokio::fs::write(self.lock_path(), b"").await
    }

    pub async fn unlock(&self) -> std::io::Result<()> {
        remove_if_exists(&self.lock_path()).await
    }

    pub async fn write_request(&self, body: &[u8]) -> std::io::Result<()> {
        write_atomic(&self.request_path(), body).await
    }

    pub async fn write_response(&self, body: &[u8]) -> std::io::Result<()> {
        write_atomic(&self.response_path(), body).await
    }

    pub async fn read_request(&self) -> std::io::Result<Option<Vec<u8>>> {
        read_if_exists(&self.request_path()).await
    }

    pub async fn read_response(&self) -> std::io::Result<Option<Vec<u8>>> {
        read_if_exists(&self.response_path()).await
    }

    pub async fn remove_request(&self) -> std::io::Result<()> {
        remove_if_exists(&self.request_path()).await
    }

    pub async fn remove_response(&self) -> std::io::Result<()> {
        remove_if_exists(&self.response_path()).await
    }
}

/// Writes to a sibling temp file, syncs it, then renames over `path` so a
/// reader never observes a partially written file.
pub async fn write_atomic(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await
}

async fn read_if_exists(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
