//! # Disk Cache
//!
//! Raw response bodies stored one file per URL under a cache root.
//! Entries are never expired; they stay until removed out-of-band.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};
use url::Url;

use super::CacheKey;
use crate::FetchError;

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    query_in_key: bool,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>, query_in_key: bool) -> Self {
        Self {
            root: root.into(),
            query_in_key,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_for(&self, url: &Url) -> Result<CacheKey, FetchError> {
        CacheKey::from_url(url, self.query_in_key)
    }

    /// Absolute location of the entry for `key`
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Convenience for `path(key_for(url))`
    pub fn path_for(&self, url: &Url) -> Result<PathBuf, FetchError> {
        Ok(self.path(&self.key_for(url)?))
    }

    pub async fn contains(&self, key: &CacheKey) -> io::Result<bool> {
        let path = self.path(key);
        Ok(fs::try_exists(&path).await? && fs::metadata(&path).await?.is_file())
    }

    /// Read an entry. Missing and zero-length entries are misses.
    pub async fn read(&self, key: &CacheKey) -> io::Result<Option<Bytes>> {
        let path = self.path(key);
        match fs::read(&path).await {
            Ok(data) if data.is_empty() => {
                debug!(path = ?path, "Ignoring empty cache entry");
                Ok(None)
            }
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store `data` for `key`, creating parent directories.
    ///
    /// The bytes go to a sibling temp file first and are renamed into
    /// place, so readers never observe a partially written entry.
    pub async fn write(&self, key: &CacheKey, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(&path);

        if let Err(e) = fs::write(&temp_path, data).await {
            warn!(path = ?temp_path, error = %e, "Failed to write cache data file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(
                from = ?temp_path,
                to = ?path,
                error = %e,
                "Failed to rename temporary cache file"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(path = ?path, size = data.len(), "Cached entry to file");
        Ok(path)
    }

    /// Delete an entry. Removing a missing entry is not an error.
    pub async fn remove(&self, key: &CacheKey) -> io::Result<()> {
        let path = self.path(key);
        match fs::remove_file(&path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?path, error = %e, "Failed to remove cache file");
                Err(e)
            }
            _ => Ok(()),
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
