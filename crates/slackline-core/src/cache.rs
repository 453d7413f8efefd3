//! On-disk channel and user directory.
//!
//! The cache is one JSON object with two maps. It is rewritten in full on
//! every update through a temporary file in the same directory, so a crash
//! mid-write leaves the previous version intact.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CacheFile {
    /// Channel name -> channel ID.
    #[serde(default, alias = "Channels")]
    channels: HashMap<String, String>,
    /// User ID -> username.
    #[serde(default, alias = "Users")]
    users: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryCache {
    path: PathBuf,
    data: CacheFile,
}

impl DirectoryCache {
    /// Load the cache at `path`. A missing file is an empty cache.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ApiError::cache(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file yet, starting empty");
                CacheFile::default()
            }
            Err(e) => return Err(ApiError::cache(&path, e)),
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channel_id(&self, name: &str) -> Option<&str> {
        self.data.channels.get(name).map(String::as_str)
    }

    pub fn username(&self, id: &str) -> Option<&str> {
        self.data.users.get(id).map(String::as_str)
    }

    /// Replace every channel entry; refreshes never merge.
    pub fn replace_channels(&mut self, channels: HashMap<String, String>) {
        self.data.channels = channels;
    }

    /// Replace every user entry; refreshes never merge.
    pub fn replace_users(&mut self, users: HashMap<String, String>) {
        self.data.users = users;
    }

    pub fn insert_user(&mut self, id: String, name: String) {
        self.data.users.insert(id, name);
    }

    pub fn channel_count(&self) -> usize {
        self.data.channels.len()
    }

    pub fn user_count(&self) -> usize {
        self.data.users.len()
    }

    /// Atomically rewrite the whole cache file.
    pub fn save(&self) -> Result<(), ApiError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| ApiError::cache(dir, e))?;

        let bytes = serde_json::to_vec(&self.data).map_err(|e| ApiError::cache(&self.path, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ApiError::cache(dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ApiError::cache(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| ApiError::cache(&self.path, e.error))?;

        debug!(
            "Saved cache ({} channels, {} users) to {}",
            self.data.channels.len(),
            self.data.users.len(),
            self.path.display()
        );
        Ok(())
    }
}
