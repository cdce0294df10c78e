// Command handlers for the cbt CLI

pub mod compile;
pub mod config;
pub mod render;

pub use compile::CompileCommand;
pub use config::{ConfigAction, ConfigCommand};
pub use render::{DataSource, RenderCommand};

use crate::error::CliResult;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Produce the command's output
    async fn run(&self) -> CliResult<String>;

    /// Execute the command, printing its output
    async fn execute(&self) -> CliResult<()> {
        let output = self.run().await?;
        print!("{}", output);
        if !output.is_empty() && !output.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
