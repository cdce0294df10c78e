//! Template error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, compiling or rendering templates
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load template {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Circular inheritance detected: {} is already being processed", path.display())]
    CircularInheritance { path: PathBuf },

    #[error("Malformed template: {message}")]
    Structure { message: String },

    #[error("Invalid directive `{directive}`: {message}")]
    Directive { directive: String, message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Invalid compiled program: {0}")]
    Program(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TemplateError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        TemplateError::Structure {
            message: message.into(),
        }
    }

    pub(crate) fn render(message: impl Into<String>) -> Self {
        TemplateError::Render {
            message: message.into(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;
