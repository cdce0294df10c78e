//! Cache entry format and freshness checks
//!
//! An encoded entry is three header lines followed by the body:
//!
//! ```text
//! /* cbt compiled template
//! {"version":"0.1.0","files":{"/abs/child.html":1700000000000}}
//! */
//! <body>
//! ```

use std::{collections::BTreeMap, io::ErrorKind, path::Path, time::UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{CacheError, Result};

const HEADER_OPEN: &str = "/* cbt compiled template";
const HEADER_CLOSE: &str = "*/";

/// Engine version plus the modification time of every source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    /// Absolute path -> modification time in milliseconds since the epoch
    #[serde(default)]
    pub files: BTreeMap<String, u64>,
}

/// Why a cached entry can no longer be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    VersionMismatch { found: String },
    Unreadable { path: String },
    Modified { path: String },
    NoDependencies,
}

impl Manifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            files: BTreeMap::new(),
        }
    }

    /// Record a dependency and its modification time
    pub fn record(&mut self, path: impl Into<String>, modified_ms: u64) {
        self.files.insert(path.into(), modified_ms);
    }

    /// Check every recorded dependency against the filesystem.
    ///
    /// Returns `None` when the entry is still usable.
    pub async fn staleness(&self, version: &str) -> Option<Staleness> {
        if self.version != version {
            return Some(Staleness::VersionMismatch {
                found: self.version.clone(),
            });
        }
        if self.files.is_empty() {
            return Some(Staleness::NoDependencies);
        }

        for (path, recorded) in &self.files {
            match modified_millis(path).await {
                Ok(current) if current > *recorded => {
                    return Some(Staleness::Modified { path: path.clone() })
                }
                Ok(_) => {}
                Err(_) => return Some(Staleness::Unreadable { path: path.clone() }),
            }
        }

        None
    }
}

/// A manifest together with the compiled body it describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub manifest: Manifest,
    pub body: String,
}

impl CacheEntry {
    pub fn new(manifest: Manifest, body: impl Into<String>) -> Self {
        Self {
            manifest,
            body: body.into(),
        }
    }

    /// Serialize to the on-disk layout
    pub fn encode(&self) -> Result<String> {
        let manifest = serde_json::to_string(&self.manifest)?;
        Ok(format!(
            "{}\n{}\n{}\n{}",
            HEADER_OPEN, manifest, HEADER_CLOSE, self.body
        ))
    }

    /// Parse the on-disk layout
    pub fn decode(contents: &str) -> Result<Self> {
        let mut parts = contents.splitn(4, '\n');

        let (header, manifest, close) = (parts.next(), parts.next(), parts.next());
        if header != Some(HEADER_OPEN) || close != Some(HEADER_CLOSE) {
            return Err(CacheError::Corrupt {
                message: "missing cache header".to_string(),
            });
        }

        let manifest: Manifest =
            serde_json::from_str(manifest.unwrap_or_default()).map_err(|e| {
                CacheError::Corrupt {
                    message: format!("invalid manifest: {}", e),
                }
            })?;

        Ok(Self {
            manifest,
            body: parts.next().unwrap_or_default().to_string(),
        })
    }
}

/// Modification time of `path` in milliseconds since the epoch
pub async fn modified_millis<P: AsRef<Path>>(path: P) -> std::io::Result<u64> {
    let modified = fs::metadata(path.as_ref()).await?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_millis() as u64)
}
