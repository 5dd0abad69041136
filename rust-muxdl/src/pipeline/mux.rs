//! Mux orchestration: combine a session's staged tracks into one file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::progress::ProgressEvent;
use crate::staging::StagingSession;
use crate::{Error, Result};

/// An external multiplexer that combines one video and one audio file.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Write the combined file to `output`, reporting completion percentages
    /// to `on_progress` as the tool emits them.
    ///
    /// Must not return while the underlying process is still running.
    async fn run_mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()>;
}

/// Runs a [`Multiplexer`] over a staging session and checks its output.
#[derive(Clone)]
pub struct MuxOrchestrator {
    muxer: std::sync::Arc<dyn Multiplexer>,
}

impl MuxOrchestrator {
    pub fn new(muxer: std::sync::Arc<dyn Multiplexer>) -> Self {
        Self { muxer }
    }

    /// Mux the session's audio and video into its output path.
    ///
    /// Progress is forwarded as received, without smoothing or ordering.
    /// Staged inputs are left in place either way; removing them is the
    /// session guard's job.
    pub async fn mux<F>(&self, session: &StagingSession, on_progress: F) -> Result<PathBuf>
    where
        F: Fn(ProgressEvent) + Send + Sync,
    {
        debug!(session = %session.token, "Muxing staged tracks");
        let forward = |percent: f64| on_progress(ProgressEvent::new(percent));

        self.muxer
            .run_mux(
                &session.video_path,
                &session.audio_path,
                &session.output_path,
                &forward,
            )
            .await
            .map_err(|e| match e {
                Error::Mux(_) => e,
                other => Error::mux(other.to_string()),
            })?;

        let size = tokio::fs::metadata(&session.output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(Error::mux("multiplexer produced no output"));
        }

        info!(session = %session.token, bytes = size, "Mux completed");
        Ok(session.output_path.clone())
    }
}
