// CLI error types

use cbt_engine::{ConfigError, TemplateError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid template data: {0}")]
    Data(String),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'cbt --help' for usage information.", message)
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(e) => {
                format!("{}\n\nRun 'cbt config show' to check the effective configuration.", e)
            }
            CliError::Template(e @ TemplateError::Load { .. }) => {
                format!("{}\n\nCheck the template name and --base-path.", e)
            }
            CliError::Template(e) => e.to_string(),
            CliError::Data(msg) => {
                format!("Invalid template data: {}\n\nData must be a JSON object.", msg)
            }
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;
