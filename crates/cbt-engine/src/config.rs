//! Engine configuration

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{delimiter::TagMatcher, error::ConfigError};

/// Default cache directory name under the system temp dir
pub const DEFAULT_CACHE_NAME: &str = "cbt-template-cache";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub left_delimiter: String,
    pub right_delimiter: String,
    /// HTML-escape `<%= %>` output
    pub escape: bool,
    /// Directory template names are resolved against
    pub base_path: PathBuf,
    /// Cache directory; empty derives one from the temp dir and `base_path`
    pub cache_path: PathBuf,
    /// Appended to template names that have no extension
    pub default_extension: String,
    pub cache_name: String,
    /// Age after which a cache lock marker is considered abandoned
    pub lock_stale_after_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            left_delimiter: "<%".to_string(),
            right_delimiter: "%>".to_string(),
            escape: true,
            base_path: PathBuf::new(),
            cache_path: PathBuf::new(),
            default_extension: ".html".to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            lock_stale_after_secs: 300,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        TagMatcher::new(&self.left_delimiter, &self.right_delimiter)?;

        if !self.default_extension.is_empty() && !self.default_extension.starts_with('.') {
            return Err(ConfigError::Validation {
                message: format!(
                    "default_extension must start with '.', got `{}`",
                    self.default_extension
                ),
            });
        }
        if self.lock_stale_after_secs == 0 {
            return Err(ConfigError::Validation {
                message: "lock_stale_after_secs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Directory holding compiled templates
    ///
    /// `cache_path` when set, otherwise `<tmp>/<cache_name>/<md5(base_path)>`.
    pub fn cache_dir(&self, cache_name: Option<&str>) -> PathBuf {
        if !self.cache_path.as_os_str().is_empty() {
            return self.cache_path.clone();
        }
        let base_hash = md5::compute(self.base_path.to_string_lossy().as_bytes());
        std::env::temp_dir()
            .join(cache_name.unwrap_or(&self.cache_name))
            .join(format!("{:x}", base_hash))
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_after_secs)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

/// Layers an optional TOML file and `CBT_*` environment variables over the
/// defaults
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "CBT".to_string(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: Some(path.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = &self.config_path {
            builder = builder.add_source(File::from(path.clone()).required(false));
        }
        builder = builder.add_source(Environment::with_prefix(&self.env_prefix));

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one file compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Resolve only this block; empty resolves the whole document
    pub block: String,
    /// Read and populate the compiled-template cache
    pub cache: bool,
    /// Overrides [`EngineConfig::cache_name`] for this call
    pub cache_name: Option<String>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            block: String::new(),
            cache: true,
            cache_name: None,
        }
    }
}

impl FileOptions {
    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.block = block.into();
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_stale_after(), Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_delimiters_rejected() {
        let config = EngineConfig {
            right_delimiter: "<%".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let config = EngineConfig {
            left_delimiter: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_dir() {
        let explicit = EngineConfig {
            cache_path: PathBuf::from("/var/cache/cbt"),
            ..Default::default()
        };
        assert_eq!(explicit.cache_dir(None), PathBuf::from("/var/cache/cbt"));

        let derived = EngineConfig {
            base_path: PathBuf::from("/srv/views"),
            ..Default::default()
        };
        let dir = derived.cache_dir(Some("custom"));
        assert!(dir.starts_with(std::env::temp_dir().join("custom")));
        let hash = format!("{:x}", md5::compute("/srv/views"));
        assert!(dir.ends_with(hash));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "left_delimiter = \"{{\"\nright_delimiter = \"}}\"\nescape = false\n",
        )
        .unwrap();

        let config = ConfigLoader::with_path(&path)
            .with_env_prefix("CBT_TEST_UNUSED")
            .load()
            .unwrap();
        assert_eq!(config.left_delimiter, "{{");
        assert!(!config.escape);
        assert_eq!(config.default_extension, ".html");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_path(temp_dir.path().join("absent.toml"))
            .with_env_prefix("CBT_TEST_UNUSED")
            .load()
            .unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("left_delimiter = \"<%\""));
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_file_options_builders() {
        let options = FileOptions::default()
            .with_block("main")
            .without_cache()
            .with_cache_name("x");
        assert_eq!(options.block, "main");
        assert!(!options.cache);
        assert_eq!(options.cache_name.as_deref(), Some("x"));
    }
}
