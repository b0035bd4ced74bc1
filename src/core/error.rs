use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),
    #[error("Not a forensicstore: {0}")]
    InvalidStore(String),
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl PluginError {
    /// Configuration errors are caller mistakes (bad path, unknown template,
    /// unparsable filter) rather than failures of the store itself.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PluginError::InvalidStore(_)
                | PluginError::TemplateNotFound(_)
                | PluginError::ConfigError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
