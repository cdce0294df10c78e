//! Advisory locking for cache writers
//!
//! A lock is a marker file created next to the cache entry with
//! `create_new`, so acquisition is atomic across processes. Markers older
//! than the staleness threshold belong to writers that died mid-write and
//! may be reclaimed. Readers never wait on a lock.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant, SystemTime},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::error::{LockError, LockResult};

/// Age after which a lock marker is considered abandoned
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

const LOCK_SUFFIX: &str = ".lock";

/// Mutual exclusion per cache key
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Take the lock for `key`, failing with [`LockError::Held`] if another
    /// writer owns a fresh lock
    async fn acquire(&self, key: &str) -> LockResult<()>;

    /// Give up the lock for `key`; releasing an absent lock is not an error
    async fn release(&self, key: &str) -> LockResult<()>;

    /// Whether a fresh lock exists for `key`
    async fn is_held(&self, key: &str) -> LockResult<bool>;
}

/// Lock manager backed by `<key>.lock` marker files
#[derive(Debug, Clone)]
pub struct FileLockManager {
    base_path: PathBuf,
    stale_after: Duration,
}

impl FileLockManager {
    /// Create a lock manager whose markers live in `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Override the staleness threshold
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Marker path for a key
    pub fn lock_path(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.base_path.join(format!("{}{}", safe_key, LOCK_SUFFIX))
    }

    async fn create_marker(&self, path: &Path) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .await?;
        Ok(())
    }

    async fn remove_marker(&self, path: &Path) -> LockResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    /// Marker age, or `None` when no marker exists
    async fn marker_age(&self, path: &Path) -> LockResult<Option<Duration>> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(path, e)),
        };
        let modified = metadata.modified().map_err(|e| LockError::io(path, e))?;

        // A marker from the future (clock skew) counts as brand new
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(Some(age))
    }
}

#[async_trait]
impl LockManager for FileLockManager {
    /// Create the marker for `key`, reclaiming it once if it is stale.
    ///
    /// Reclaiming is not atomic. Two writers that both find the same stale
    /// marker may each remove it, and the slower one can then delete the
    /// marker the faster one just created, so both end up writing. Entries
    /// are replaced whole by a rename, so the cost is a redundant write of
    /// the same program rather than a torn file.
    async fn acquire(&self, key: &str) -> LockResult<()> {
        let path = self.lock_path(key);

        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| LockError::io(&self.base_path, e))?;

        match self.create_marker(&path).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(LockError::io(&path, e)),
        }

        match self.marker_age(&path).await? {
            Some(age) if age <= self.stale_after => {
                return Err(LockError::Held { path });
            }
            Some(age) => {
                debug!("Reclaiming stale lock {} ({:?} old)", path.display(), age);
                self.remove_marker(&path).await?;
            }
            None => {}
        }

        // One retry only; losing this race means another writer got there first
        match self.create_marker(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(LockError::Held { path }),
            Err(e) => Err(LockError::io(&path, e)),
        }
    }

    async fn release(&self, key: &str) -> LockResult<()> {
        self.remove_marker(&self.lock_path(key)).await
    }

    async fn is_held(&self, key: &str) -> LockResult<bool> {
        let path = self.lock_path(key);
        Ok(matches!(self.marker_age(&path).await?, Some(age) if age <= self.stale_after))
    }
}

/// In-process lock manager for tests and single-process setups
#[derive(Debug, Clone)]
pub struct MemoryLockManager {
    locks: Arc<Mutex<HashMap<String, Instant>>>,
    stale_after: Duration,
}

impl MemoryLockManager {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Override the staleness threshold
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    fn held_path(key: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", key, LOCK_SUFFIX))
    }
}

impl Default for MemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn acquire(&self, key: &str) -> LockResult<()> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        match locks.get(key) {
            Some(taken) if taken.elapsed() <= self.stale_after => Err(LockError::Held {
                path: Self::held_path(key),
            }),
            _ => {
                locks.insert(key.to_string(), Instant::now());
                Ok(())
            }
        }
    }

    async fn release(&self, key: &str) -> LockResult<()> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(key);
        Ok(())
    }

    async fn is_held(&self, key: &str) -> LockResult<bool> {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(matches!(locks.get(key), Some(taken) if taken.elapsed() <= self.stale_after))
    }
}
