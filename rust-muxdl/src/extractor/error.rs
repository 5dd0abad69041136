use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported url")]
    UnsupportedUrl,
    #[error("video unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("other: {0}")]
    Other(String),
}
