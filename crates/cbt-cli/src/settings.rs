// Engine settings for CLI invocations

use std::path::{Path, PathBuf};

use cbt_engine::{ConfigLoader, Engine, EngineConfig};

use crate::error::CliResult;

/// `<config dir>/cbt/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cbt")
        .join("config.toml")
}

/// Configuration from `config_path` (or the default location) and `CBT_*`
/// variables, with `base_path` overriding the configured one
pub fn load_config(config_path: Option<&Path>, base_path: Option<&Path>) -> CliResult<EngineConfig> {
    let path = config_path.map_or_else(default_config_path, Path::to_path_buf);
    let mut config = ConfigLoader::with_path(&path).load()?;

    if let Some(base_path) = base_path {
        config.base_path = base_path.to_path_buf();
    }
    tracing::debug!(config = %path.display(), base_path = %config.base_path.display(), "Loaded configuration");

    Ok(config)
}

pub fn load_engine(config_path: Option<&Path>, base_path: Option<&Path>) -> CliResult<Engine> {
    Ok(Engine::new(load_config(config_path, base_path)?)?)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("cbt/config.toml"));
    }

    #[test]
    fn test_base_path_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "base_path = \"/from/file\"\nescape = false\n").unwrap();

        let config = load_config(Some(&path), Some(Path::new("/from/flag"))).unwrap();
        assert_eq!(config.base_path, PathBuf::from("/from/flag"));
        assert!(!config.escape);
    }
}
