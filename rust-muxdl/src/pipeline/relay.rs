//! Direct relay of a single variant: no staging, no muxing.

use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::debug;

use super::output::{DownloadOutput, OCTET_STREAM};
use crate::domain::{MediaDetails, StreamVariant, filename_for};
use crate::fetcher::StreamFetcher;
use crate::{Error, Result};

#[derive(Clone)]
pub struct DirectRelay {
    fetcher: Arc<dyn StreamFetcher>,
}

impl DirectRelay {
    pub fn new(fetcher: Arc<dyn StreamFetcher>) -> Self {
        Self { fetcher }
    }

    /// Open the variant's stream and wrap it with its delivery metadata.
    /// Bytes are forwarded as they arrive; nothing touches the disk.
    pub async fn open(
        &self,
        details: &MediaDetails,
        variant: &StreamVariant,
    ) -> Result<DownloadOutput> {
        debug!(url = %details.url, variant = %variant.id, "Relaying variant directly");
        let body = self
            .fetcher
            .open_stream(&details.url, variant)
            .await
            .map_err(into_fetch)?;

        let content_type = if variant.mime_type.is_empty() {
            OCTET_STREAM.to_string()
        } else {
            variant.mime_type.clone()
        };

        Ok(DownloadOutput {
            filename: filename_for(&details.title, variant.extension()),
            content_type,
            content_length: None,
            body,
        })
    }

    /// Relay straight into `sink`. A source failure after bytes were written
    /// leaves the sink truncated and returns `Error::Fetch`.
    pub async fn relay<W>(
        &self,
        details: &MediaDetails,
        variant: &StreamVariant,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.open(details, variant).await?.write_to(sink).await
    }
}

fn into_fetch(e: Error) -> Error {
    match e {
        Error::Fetch(_) => e,
        other => Error::fetch(other.to_string()),
    }
}
