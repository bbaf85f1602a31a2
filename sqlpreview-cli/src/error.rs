//! CLI error types and result alias.

use miette::Diagnostic;
use sqlpreview_engine::PreviewError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(sqlpreview::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(sqlpreview::config))]
    Config(String),

    /// The CI event could not be interpreted
    #[error("Event error: {0}")]
    #[diagnostic(code(sqlpreview::event))]
    Event(String),

    /// Preview pipeline error
    #[error(transparent)]
    #[diagnostic(code(sqlpreview::preview))]
    Preview(#[from] PreviewError),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Event(format!("Failed to parse event payload: {}", err))
    }
}
