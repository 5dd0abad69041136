//! Extraction providers: turn a source URL into a title and its variants.

mod error;
mod ytdlp;

use async_trait::async_trait;

use crate::domain::MediaDetails;

pub use error::ExtractorError;
pub use ytdlp::{DEFAULT_YTDLP_PATH, YtDlpProvider};

/// Resolves a source URL into its title and raw stream variants.
///
/// Implementations fail fast: a URL that cannot be resolved now is not
/// expected to resolve on retry.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, url: &str) -> Result<MediaDetails, ExtractorError>;
}
