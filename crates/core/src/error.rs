//! Error types for blobcdn-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blobcdn-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blobcdn-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required environment variable absent or empty
    #[error("{0} not found in environment variables")]
    MissingEnv(&'static str),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// Local file could not be located, even after joining the root
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Manifest kind declared on the command line but not readable
    #[error("Unsupported manifest: {0}")]
    UnsupportedManifest(String),

    /// A blob with the same name already exists in the container
    #[error("Blob '{blob}' already exists in container '{container}'")]
    BlobExists { container: String, blob: String },

    /// Target container does not exist
    #[error("Container '{0}' does not exist")]
    ContainerNotFound(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Any other non-success response from the storage service
    #[error("Storage service returned {status}: {message}")]
    Storage { status: u16, message: String },

    /// Shared access signature could not be produced
    #[error("Signature error: {0}")]
    Signature(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Errors that make every further upload pointless
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::MissingEnv(_) | Error::Config(_) | Error::InvalidConfig(_) | Error::Signature(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Network(err.to_string())
        } else if err.is_request() || err.is_builder() {
            Error::HttpClient(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidConfig(format!("invalid account url: {}", err))
    }
}
