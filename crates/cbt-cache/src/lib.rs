//! # cbt cache
//!
//! On-disk cache for compiled templates. Each entry carries a manifest of the
//! engine version and the modification time of every source file that went
//! into it, so a lookup can tell whether the entry is still fresh without
//! recompiling anything.
//!
//! ## Features
//!
//! - **Swappable backends**: disk and in-memory [`CacheStorage`] implementations
//! - **Advisory locking**: `<entry>.lock` markers with a staleness timeout
//! - **Non-blocking readers**: a locked entry is reported as a miss
//! - **Best-effort writes**: store failures are logged, never surfaced

pub mod error;
pub mod lock;
pub mod manifest;
pub mod storage;
pub mod store;

pub use error::{CacheError, LockError, LockResult, Result};
pub use lock::{FileLockManager, LockManager, MemoryLockManager, DEFAULT_STALE_AFTER};
pub use manifest::{modified_millis, CacheEntry, Manifest, Staleness};
pub use storage::{CacheStorage, DiskStorage, MemoryStorage};
pub use store::{cache_key, CompiledCache};
