//! Application-wide error types.

use thiserror::Error;

use crate::extractor::ExtractorError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// The first five variants form the download taxonomy: every failure of the
/// pipeline surfaces as exactly one of them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Mux error: {0}")]
    Mux(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    pub fn streaming(msg: impl Into<String>) -> Self {
        Self::Streaming(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Provider(_) => "provider",
            Self::Fetch(_) => "fetch",
            Self::Mux(_) => "mux",
            Self::Streaming(_) => "streaming",
            Self::Configuration(_) => "configuration",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

impl From<ExtractorError> for Error {
    fn from(err: ExtractorError) -> Self {
        Self::Provider(err.to_string())
    }
}
