//! Cache storage backends

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};

use crate::Result;

/// Distinguishes temporary files of concurrent writers in one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Key-value store for encoded cache entries
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Retrieve the raw contents stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store raw contents under `key`, replacing any previous value
    async fn put(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove the value stored under `key`, returning whether one existed
    async fn invalidate(&self, key: &str) -> Result<bool>;
}

/// In-memory cache storage
#[derive(Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create new in-memory storage
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the storage holds no entries
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, contents: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }
}

/// Disk-based cache storage, one file per key
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_path: PathBuf,
}

impl DiskStorage {
    /// Create new disk storage with base path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the cache files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get file path for a key
    pub fn key_path(&self, key: &str) -> PathBuf {
        // Sanitize key for filesystem
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.base_path.join(safe_key)
    }

    fn temp_path(&self, key_path: &Path) -> PathBuf {
        let mut name = key_path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        self.base_path.join(name)
    }

    async fn ensure_base_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temporary file, then rename it over the entry so readers
    /// never observe a partial body
    async fn put(&self, key: &str, contents: &str) -> Result<()> {
        self.ensure_base_dir().await?;
        let path = self.key_path(key);
        let temp = self.temp_path(&path);
        fs::write(&temp, contents).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
