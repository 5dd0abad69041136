//! Concurrent fetch of the audio and video tracks into a staging session.

use futures::StreamExt;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::domain::StreamVariant;
use crate::fetcher::StreamFetcher;
use crate::staging::StagingSession;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Audio,
    Video,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Bytes written per track by a successful [`FetchCoordinator::fetch_both`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub audio_bytes: u64,
    pub video_bytes: u64,
}

/// Runs the two track fetches of a dual-stream request side by side.
#[derive(Clone)]
pub struct FetchCoordinator {
    fetcher: Arc<dyn StreamFetcher>,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn StreamFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch `audio` and `video` concurrently into the session's staging
    /// paths.
    ///
    /// Both fetches run as futures of the caller's task. The first failure
    /// returns at once and drops the sibling, and dropping the returned future
    /// stops both writers, so no writer outlives the call.
    pub async fn fetch_both(
        &self,
        url: &str,
        audio: &StreamVariant,
        video: &StreamVariant,
        session: &StagingSession,
    ) -> Result<FetchReport> {
        let fetcher = self.fetcher.as_ref();
        let (audio_bytes, video_bytes) = tokio::try_join!(
            fetch_logged(fetcher, session, Track::Audio, url, audio, &session.audio_path),
            fetch_logged(fetcher, session, Track::Video, url, video, &session.video_path),
        )?;

        let report = FetchReport {
            audio_bytes,
            video_bytes,
        };
        info!(
            session = %session.token,
            audio_bytes = report.audio_bytes,
            video_bytes = report.video_bytes,
            "Both tracks staged"
        );
        Ok(report)
    }
}

async fn fetch_logged(
    fetcher: &dyn StreamFetcher,
    session: &StagingSession,
    track: Track,
    url: &str,
    variant: &StreamVariant,
    path: &Path,
) -> Result<u64> {
    fetch_to_file(fetcher, track, url, variant, path)
        .await
        .inspect_err(|e| {
            error!(session = %session.token, track = %track, error = %e, "Fetch failed");
        })
}

/// Stream one variant into `path`, returning the number of bytes written.
async fn fetch_to_file(
    fetcher: &dyn StreamFetcher,
    track: Track,
    url: &str,
    variant: &StreamVariant,
    path: &Path,
) -> Result<u64> {
    debug!(track = %track, variant = %variant.id, path = %path.display(), "Fetching track");
    let mut stream = fetcher.open_stream(url, variant).await?;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::fetch(format!("cannot create {track} staging file: {e}")))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| match e {
            Error::Fetch(_) => e,
            other => Error::fetch(other.to_string()),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::fetch(format!("cannot write {track} staging file: {e}")))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::fetch(format!("cannot flush {track} staging file: {e}")))?;

    debug!(track = %track, bytes = written, "Track fetched");
    Ok(written)
}
