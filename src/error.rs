//! Custom error types for review-watch

use thiserror::Error;

/// Main error type for review-watch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Persistence error ({path}): {message}")]
    Persistence { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'review-watch init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a persistence error tagged with the file it concerns
    pub fn persistence(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Error::Persistence {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for review-watch
pub type Result<T> = std::result::Result<T, Error>;
