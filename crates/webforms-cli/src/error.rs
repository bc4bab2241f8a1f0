//! Error handling for the WebForms CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("WebForms error: {0}")]
    Core(#[from] webforms_core::WebFormsError),

    #[error("View state error: {0}")]
    ViewState(#[from] webforms_core::ViewStateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid form input: {0}")]
    FormInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
