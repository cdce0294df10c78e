// Configuration inspection

use std::path::PathBuf;

use async_trait::async_trait;

use super::Command;
use crate::{error::CliResult, settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Effective configuration as TOML
    Show,
    /// Location of the configuration file
    Path,
}

/// Inspect the engine configuration
pub struct ConfigCommand {
    pub action: ConfigAction,
    pub config: Option<PathBuf>,
    pub base_path: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn new(action: ConfigAction) -> Self {
        Self {
            action,
            config: None,
            base_path: None,
        }
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn with_base_path(mut self, base_path: Option<PathBuf>) -> Self {
        self.base_path = base_path;
        self
    }
}

#[async_trait]
impl Command for ConfigCommand {
    async fn run(&self) -> CliResult<String> {
        match self.action {
            ConfigAction::Show => {
                let config =
                    settings::load_config(self.config.as_deref(), self.base_path.as_deref())?;
                Ok(config.to_toml_string()?)
            }
            ConfigAction::Path => Ok(self
                .config
                .clone()
                .unwrap_or_else(settings::default_config_path)
                .display()
                .to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_show_reflects_file_and_flags() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "default_extension = \".tpl\"\n").unwrap();

        let output = ConfigCommand::new(ConfigAction::Show)
            .with_config(Some(path))
            .with_base_path(Some(PathBuf::from("/views")))
            .run()
            .await
            .unwrap();
        assert!(output.contains("default_extension = \".tpl\""));
        assert!(output.contains("base_path = \"/views\""));
    }

    #[tokio::test]
    async fn test_path() {
        let output = ConfigCommand::new(ConfigAction::Path)
            .with_config(Some(PathBuf::from("/etc/cbt.toml")))
            .run()
            .await
            .unwrap();
        assert_eq!(output, "/etc/cbt.toml");
    }
}
