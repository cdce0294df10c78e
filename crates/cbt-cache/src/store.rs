//! Compiled-template cache
//!
//! Combines a [`CacheStorage`] with a [`LockManager`]: lookups never wait and
//! degrade to a miss on any problem, stores are best-effort and hold the
//! key's lock for the duration of the write.

use std::{path::Path, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    lock::{FileLockManager, LockManager, MemoryLockManager},
    manifest::CacheEntry,
    storage::{CacheStorage, DiskStorage, MemoryStorage},
    Result,
};

/// File name for a template name plus optional block selector
///
/// `md5(name)` or `md5(name + ":" + block)`, followed by `extension`.
pub fn cache_key(name: &str, block: &str, extension: &str) -> String {
    let source = if block.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", name, block)
    };
    format!("{:x}{}", md5::compute(source.as_bytes()), extension)
}

/// Cache of compiled templates validated against source modification times
#[derive(Clone)]
pub struct CompiledCache {
    storage: Arc<dyn CacheStorage>,
    locks: Arc<dyn LockManager>,
    version: String,
}

impl CompiledCache {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        locks: Arc<dyn LockManager>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            locks,
            version: version.into(),
        }
    }

    /// Cache files and their lock markers in `dir`
    pub fn on_disk<P: AsRef<Path>>(
        dir: P,
        version: impl Into<String>,
        stale_after: Duration,
    ) -> Self {
        let dir = dir.as_ref();
        Self::new(
            Arc::new(DiskStorage::new(dir)),
            Arc::new(FileLockManager::new(dir).with_stale_after(stale_after)),
            version,
        )
    }

    /// Process-local cache; nothing touches the filesystem
    pub fn in_memory(version: impl Into<String>) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryLockManager::new()),
            version,
        )
    }

    /// Engine version entries are validated against
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fetch a fresh entry for `key`, or `None` on any kind of miss
    pub async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        match self.locks.is_held(key).await {
            Ok(false) => {}
            Ok(true) => {
                debug!("Cache entry {} is locked, treating as miss", key);
                return None;
            }
            Err(e) => {
                debug!("Cannot check lock for {}: {}", key, e);
                return None;
            }
        }

        let contents = match self.storage.get(key).await {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                debug!("Cannot read cache entry {}: {}", key, e);
                return None;
            }
        };

        let entry = match CacheEntry::decode(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Ignoring cache entry {}: {}", key, e);
                return None;
            }
        };

        if let Some(reason) = entry.manifest.staleness(&self.version).await {
            debug!("Cache entry {} is stale: {:?}", key, reason);
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(entry)
    }

    /// Write an entry under the key's lock.
    ///
    /// Returns whether the entry was written. Contention and I/O failures
    /// are logged and otherwise ignored.
    pub async fn store(&self, key: &str, entry: &CacheEntry) -> bool {
        if let Err(e) = self.locks.acquire(key).await {
            if e.is_held() {
                debug!("Skipping cache write for {}: {}", key, e);
            } else {
                warn!("Cannot lock cache entry {}: {}", key, e);
            }
            return false;
        }

        let written = self.write(key, entry).await;

        if let Err(e) = self.locks.release(key).await {
            warn!("Cannot release cache lock for {}: {}", key, e);
        }

        match written {
            Ok(()) => true,
            Err(e) => {
                warn!("Cannot write cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Drop the entry for `key`, if any
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        self.storage.invalidate(key).await
    }

    async fn write(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let encoded = entry.encode()?;
        self.storage.put(key, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_uses_block_selector() {
        let plain = cache_key("index.html", "", ".html");
        let with_block = cache_key("index.html", "main", ".html");

        assert_eq!(plain, format!("{:x}.html", md5::compute("index.html")));
        assert_eq!(
            with_block,
            format!("{:x}.html", md5::compute("index.html:main"))
        );
        assert_ne!(plain, with_block);
    }

    #[tokio::test]
    async fn test_locked_entry_is_a_miss() {
        let storage = Arc::new(MemoryStorage::new());
        let locks = Arc::new(MemoryLockManager::new());
        let cache = CompiledCache::new(storage.clone(), locks.clone(), "1");

        storage.put("k", "anything").await.unwrap();
        locks.acquire("k").await.unwrap();

        assert!(cache.lookup("k").await.is_none());
        assert!(!cache.store("k", &CacheEntry::new(crate::Manifest::new("1"), "")).await);
    }

    #[tokio::test]
    async fn test_in_memory_cache_round_trip() {
        let cache = CompiledCache::in_memory("2.0");
        assert_eq!(cache.version(), "2.0");
        assert!(cache.lookup("k").await.is_none());

        let mut manifest = crate::Manifest::new("2.0");
        manifest.record(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"), u64::MAX);
        let entry = CacheEntry::new(manifest.clone(), "body");
        assert!(cache.store("k", &entry).await);
        assert_eq!(cache.lookup("k").await.unwrap().body, "body");

        // Entries written by another engine version are stale
        manifest.version = "1.0".to_string();
        let older = CacheEntry::new(manifest, "old");
        assert!(cache.store("old", &older).await);
        assert!(cache.lookup("old").await.is_none());

        assert!(cache.invalidate("k").await.unwrap());
        assert!(cache.lookup("k").await.is_none());
        assert!(!cache.invalidate("k").await.unwrap());
    }
}
