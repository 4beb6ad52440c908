use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::CacheEntry;
use crate::error::CacheError;
use crate::traits::FileSystem;

/// Keyed storage for cache entries
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, replacing any entry with the same key
    fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = self.entries.read().unwrap();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One JSON document per entry under a directory
pub struct FileCacheStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn io_error(key: &str, err: impl std::fmt::Display) -> CacheError {
        CacheError::Io {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        if !self.fs.exists(&path) {
            return Ok(None);
        }

        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| Self::io_error(key, e))?;

        let entry: CacheEntry = serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(entry))
    }

    fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let content =
            serde_json::to_string(entry).map_err(|e| Self::io_error(&entry.key, e))?;

        // Written beside the final path, then moved over it whole
        let temp_path = self
            .dir
            .join(format!(".{}.{}.tmp", entry.key, uuid::Uuid::new_v4()));

        self.fs
            .write(&temp_path, &content)
            .map_err(|e| Self::io_error(&entry.key, e))?;

        if let Err(e) = self.fs.rename(&temp_path, &self.entry_path(&entry.key)) {
            let _ = self.fs.remove_file(&temp_path);
            return Err(Self::io_error(&entry.key, e));
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if !self.fs.exists(&path) {
            return Ok(());
        }
        self.fs.remove_file(&path).map_err(|e| Self::io_error(key, e))
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        if !self.fs.is_dir(&self.dir) {
            return Ok(Vec::new());
        }

        let paths = self
            .fs
            .read_dir(&self.dir)
            .map_err(|e| Self::io_error("*", e))?;

        Ok(paths
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
            .filter(|stem| !stem.starts_with('.'))
            .map(|stem| stem.to_string())
            .collect())
    }
}
