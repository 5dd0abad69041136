//! Stream fetchers: open a byte stream for one selected variant.

mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::Result;
use crate::domain::StreamVariant;

pub use http::HttpStreamFetcher;

/// A stream of media bytes. Errors may appear at any point, after which the
/// stream yields nothing further.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opens the byte stream of one variant of a source URL.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Open the stream. Failures to connect or non-success responses are
    /// `Error::Fetch`; so is every error item the returned stream yields.
    async fn open_stream(&self, source_url: &str, variant: &StreamVariant) -> Result<ByteStream>;
}
