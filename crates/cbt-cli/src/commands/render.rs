// Render a template file

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use cbt_engine::FileOptions;

use super::Command;
use crate::{
    error::{CliError, CliResult},
    settings,
};

/// Where the template data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Empty,
    Inline(String),
    File(PathBuf),
}

impl DataSource {
    pub fn from_args(data: Option<String>, data_file: Option<PathBuf>) -> Self {
        match (data, data_file) {
            (Some(json), _) => DataSource::Inline(json),
            (None, Some(path)) => DataSource::File(path),
            (None, None) => DataSource::Empty,
        }
    }

    pub async fn load(&self) -> CliResult<serde_json::Value> {
        self.read().await.map_err(|e| CliError::Data(format!("{:#}", e)))
    }

    async fn read(&self) -> anyhow::Result<serde_json::Value> {
        let value: serde_json::Value = match self {
            DataSource::Empty => return Ok(serde_json::Value::Object(Default::default())),
            DataSource::Inline(json) => {
                serde_json::from_str(json).context("cannot parse --data")?
            }
            DataSource::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("cannot parse {}", path.display()))?
            }
        };

        anyhow::ensure!(value.is_object(), "expected a JSON object");
        Ok(value)
    }
}

/// Render a template file with data
pub struct RenderCommand {
    pub file: String,
    pub data: DataSource,
    pub block: Option<String>,
    pub sub: Option<String>,
    pub no_cache: bool,
    pub config: Option<PathBuf>,
    pub base_path: Option<PathBuf>,
}

impl RenderCommand {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            data: DataSource::Empty,
            block: None,
            sub: None,
            no_cache: false,
            config: None,
            base_path: None,
        }
    }

    pub fn with_data(mut self, data: DataSource) -> Self {
        self.data = data;
        self
    }

    pub fn with_block(mut self, block: Option<String>) -> Self {
        self.block = block;
        self
    }

    pub fn with_sub(mut self, sub: Option<String>) -> Self {
        self.sub = sub;
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn with_base_path(mut self, base_path: Option<PathBuf>) -> Self {
        self.base_path = base_path;
        self
    }

    fn file_options(&self) -> FileOptions {
        let mut options = FileOptions::default().with_block(self.block.clone().unwrap_or_default());
        options.cache = !self.no_cache;
        options
    }
}

#[async_trait]
impl Command for RenderCommand {
    async fn run(&self) -> CliResult<String> {
        let engine = settings::load_engine(self.config.as_deref(), self.base_path.as_deref())?;
        let data = self.data.load().await?;

        let template = engine.compile_file(&self.file, &self.file_options()).await?;
        let output = match &self.sub {
            Some(sub) => template.render_sub(&data, sub)?,
            None => template.render(&data)?,
        };

        engine.flush_cache_writes().await;
        Ok(output)
    }
}
