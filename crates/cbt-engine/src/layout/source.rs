//! Template file loading and path resolution

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{Result, TemplateError};

/// A template file as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub content: String,
    /// Modification time in milliseconds since the epoch
    pub modified_ms: u64,
}

/// Read a template and its modification time
pub async fn load(path: &Path) -> Result<TemplateSource> {
    let load_error = |source| TemplateError::Load {
        path: path.to_path_buf(),
        source,
    };

    let content = fs::read_to_string(path).await.map_err(load_error)?;
    let modified_ms = cbt_cache::modified_millis(path)
        .await
        .map_err(load_error)?;
    debug!(path = %path.display(), bytes = content.len(), "Loaded template");

    Ok(TemplateSource {
        path: path.to_path_buf(),
        content,
        modified_ms,
    })
}

/// Append `default_extension` when `name` has no extension of its own
pub fn with_extension(name: &str, default_extension: &str) -> String {
    if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}{}", name, default_extension)
    }
}

/// Path of a requested template, always inside `base_path`
pub fn template_path(base_path: &Path, name: &str) -> PathBuf {
    normalize(&base_path.join(name.trim_start_matches('/')))
}

/// Path of an `extends` target: names starting with `/` resolve against
/// `base_path`, anything else against the extending file's directory
pub fn extends_path(
    name: &str,
    extending_file: &Path,
    base_path: &Path,
    default_extension: &str,
) -> PathBuf {
    let name = with_extension(name, default_extension);
    if name.starts_with('/') {
        template_path(base_path, &name)
    } else {
        let dir = extending_file.parent().unwrap_or_else(|| Path::new(""));
        normalize(&dir.join(name))
    }
}

/// Lexically remove `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
