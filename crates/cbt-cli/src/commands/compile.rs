// Compile a template file without rendering it

use std::path::PathBuf;

use async_trait::async_trait;
use cbt_engine::FileOptions;

use super::Command;
use crate::{error::CliResult, settings};

/// Print the compiled program, or the resolved text with `resolved`
pub struct CompileCommand {
    pub file: String,
    pub block: Option<String>,
    pub resolved: bool,
    pub config: Option<PathBuf>,
    pub base_path: Option<PathBuf>,
}

impl CompileCommand {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            block: None,
            resolved: false,
            config: None,
            base_path: None,
        }
    }

    pub fn with_block(mut self, block: Option<String>) -> Self {
        self.block = block;
        self
    }

    pub fn with_resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
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
}

#[async_trait]
impl Command for CompileCommand {
    async fn run(&self) -> CliResult<String> {
        let engine = settings::load_engine(self.config.as_deref(), self.base_path.as_deref())?;
        let block = self.block.clone().unwrap_or_default();

        if self.resolved {
            let document = engine.resolve_file(&self.file, &block).await?;
            return Ok(document.text);
        }

        // Always compiled fresh so the output reflects the current sources
        let options = FileOptions::default().with_block(block).without_cache();
        let template = engine.compile_file(&self.file, &options).await?;
        Ok(template.program().encode()?)
    }
}
