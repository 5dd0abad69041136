//! Request dispatch: the download state machine over all pipeline stages.

use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::coordinator::FetchCoordinator;
use super::mux::{Multiplexer, MuxOrchestrator};
use super::output::{DownloadOutput, StagedOutput};
use super::progress::{ProgressEvent, ProgressPublisher};
use super::relay::DirectRelay;
use crate::domain::{
    DownloadRequest, MediaDetails, ResolvedSelection, StreamVariant, VariantCatalog, filename_for,
};
use crate::extractor::MetadataProvider;
use crate::fetcher::StreamFetcher;
use crate::resolver::VariantResolver;
use crate::staging::{OUTPUT_EXTENSION, StagingSession, StagingStore};
use crate::{Error, Result};

pub const MUXED_CONTENT_TYPE: &str = "video/mp4";

/// Stages of one download request, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Validating,
    Resolving,
    DirectRelay,
    Staging,
    Fetching,
    Muxing,
    StreamingOutput,
    CleanedUp,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "VALIDATING",
            Self::Resolving => "RESOLVING",
            Self::DirectRelay => "DIRECT_RELAY",
            Self::Staging => "STAGING",
            Self::Fetching => "FETCHING",
            Self::Muxing => "MUXING",
            Self::StreamingOutput => "STREAMING_OUTPUT",
            Self::CleanedUp => "CLEANED_UP",
        };
        f.write_str(s)
    }
}

/// Summary returned by [`DownloadService::get_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSummary {
    pub title: String,
}

/// The core download service shared by every request.
pub struct DownloadService {
    resolver: VariantResolver,
    relay: DirectRelay,
    coordinator: FetchCoordinator,
    orchestrator: MuxOrchestrator,
    staging: StagingStore,
    progress: ProgressPublisher,
}

impl DownloadService {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        fetcher: Arc<dyn StreamFetcher>,
        multiplexer: Arc<dyn Multiplexer>,
        staging: StagingStore,
        progress: ProgressPublisher,
    ) -> Self {
        Self {
            resolver: VariantResolver::new(provider),
            relay: DirectRelay::new(fetcher.clone()),
            coordinator: FetchCoordinator::new(fetcher),
            orchestrator: MuxOrchestrator::new(multiplexer),
            staging,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressPublisher {
        &self.progress
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// Partitioned variants of `url`.
    pub async fn get_formats(&self, url: &str) -> Result<VariantCatalog> {
        self.resolver.resolve(require_url(url)?).await
    }

    pub async fn get_info(&self, url: &str) -> Result<MediaSummary> {
        let details = self.resolver.resolve_details(require_url(url)?).await?;
        Ok(MediaSummary {
            title: details.title,
        })
    }

    /// Progress events published from now on. Never ends while the service
    /// lives; resubscribe to restart, missed events are not replayed.
    pub fn subscribe_progress(
        &self,
    ) -> impl futures::Stream<Item = ProgressEvent> + Send + 'static {
        self.progress.subscribe_stream()
    }

    /// Run one download request to a deliverable output.
    ///
    /// For dual-stream requests the staged files are removed on every exit:
    /// here on fetch or mux failure, and by the returned body once it is
    /// fully read, fails, or is dropped.
    pub async fn download(&self, request: DownloadRequest) -> Result<DownloadOutput> {
        transition(&request.url, DownloadState::Validating);
        request.validate()?;

        transition(&request.url, DownloadState::Resolving);
        let details = self.resolver.resolve_details(&request.url).await?;
        let selection = ResolvedSelection::bind(&request.selection, &details)?;

        match selection {
            ResolvedSelection::Single(variant) => {
                transition(&request.url, DownloadState::DirectRelay);
                let output = self.relay.open(&details, &variant).await?;
                info!(
                    url = %request.url,
                    variant = %variant.id,
                    filename = %output.filename,
                    "Direct relay started"
                );
                Ok(output)
            }
            ResolvedSelection::Dual { audio, video } => {
                self.download_dual(&details, &audio, &video).await
            }
        }
    }

    async fn download_dual(
        &self,
        details: &MediaDetails,
        audio: &StreamVariant,
        video: &StreamVariant,
    ) -> Result<DownloadOutput> {
        transition(&details.url, DownloadState::Staging);
        let session = self.staging.create_session(audio, video).await?;
        let mut guard = session.cleanup_guard();

        match self.fetch_and_mux(details, audio, video, &session).await {
            Ok(file) => {
                let content_length = file.metadata().await.ok().map(|m| m.len());
                transition(&details.url, DownloadState::StreamingOutput);
                info!(session = %session.token, bytes = ?content_length, "Streaming muxed output");
                Ok(DownloadOutput {
                    filename: filename_for(&details.title, OUTPUT_EXTENSION),
                    content_type: MUXED_CONTENT_TYPE.to_string(),
                    content_length,
                    // The body owns the guard and logs the final state.
                    body: StagedOutput::new(&details.url, file, guard).boxed(),
                })
            }
            Err(e) => {
                error!(session = %session.token, error = %e, "Dual-stream download failed");
                guard.release().await;
                transition(&details.url, DownloadState::CleanedUp);
                Err(e)
            }
        }
    }

    async fn fetch_and_mux(
        &self,
        details: &MediaDetails,
        audio: &StreamVariant,
        video: &StreamVariant,
        session: &StagingSession,
    ) -> Result<tokio::fs::File> {
        transition(&details.url, DownloadState::Fetching);
        self.coordinator.fetch_both(&details.url, audio, video, session).await?;

        transition(&details.url, DownloadState::Muxing);
        let progress = self.progress.clone();
        let output = self
            .orchestrator
            .mux(session, move |event| {
                progress.publish(event);
            })
            .await?;

        tokio::fs::File::open(&output).await.map_err(|e| {
            warn!(session = %session.token, error = %e, "Cannot open muxed output");
            Error::mux("muxed output is not readable")
        })
    }
}

fn require_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::validation("url is required"));
    }
    Ok(url)
}

pub(super) fn transition(url: &str, state: DownloadState) {
    debug!(url = %url, state = %state, "Download state");
}
