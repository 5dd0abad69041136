//! Per-request temporary storage for dual-stream downloads.

mod cleanup;

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::StreamVariant;
use crate::{Error, Result};

pub use cleanup::CleanupGuard;

/// Directory name used under the system temp dir when none is configured.
pub const DEFAULT_STAGING_DIR_NAME: &str = "rust-muxdl";

/// Container of the muxed output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Allocates staging sessions under one private root directory.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::config(format!(
                "cannot create staging directory {}: {e}",
                self.root.display()
            ))
        })
    }

    /// Allocate the three paths of a new session. Nothing is written yet.
    pub async fn create_session(
        &self,
        audio: &StreamVariant,
        video: &StreamVariant,
    ) -> Result<StagingSession> {
        self.ensure_root().await?;
        let token = session_token();
        let session = StagingSession {
            audio_path: self
                .root
                .join(format!("audio-{}.{}", token, audio.extension())),
            video_path: self
                .root
                .join(format!("video-{}.{}", token, video.extension())),
            output_path: self
                .root
                .join(format!("output-{}.{}", token, OUTPUT_EXTENSION)),
            token,
        };
        debug!(session = %session.token, root = %self.root.display(), "Staging session created");
        Ok(session)
    }
}

/// `<unix millis>-<random>`: ordered by creation time, unique across
/// concurrent requests.
fn session_token() -> String {
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

/// The staged file locations of one dual-stream request.
#[derive(Debug, Clone)]
pub struct StagingSession {
    pub token: String,
    pub audio_path: PathBuf,
    pub video_path: PathBuf,
    pub output_path: PathBuf,
}

impl StagingSession {
    pub fn paths(&self) -> [&Path; 3] {
        [&self.audio_path, &self.video_path, &self.output_path]
    }

    /// A guard that deletes all three paths when released or dropped.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(
            self.token.clone(),
            self.paths().iter().map(|p| p.to_path_buf()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn variants() -> (StreamVariant, StreamVariant) {
        (
            StreamVariant::new("140", true, false, "m4a"),
            StreamVariant::new("248", false, true, "webm"),
        )
    }

    #[tokio::test]
    async fn test_session_paths_live_under_root() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path().join("staging"));
        let (audio, video) = variants();

        let session = store.create_session(&audio, &video).await.unwrap();
        assert!(store.root().is_dir());
        for path in session.paths() {
            assert_eq!(path.parent(), Some(store.root()));
            assert!(!path.exists());
        }
        assert!(session.audio_path.to_string_lossy().ends_with(".m4a"));
        assert!(session.video_path.to_string_lossy().ends_with(".webm"));
        assert!(session.output_path.to_string_lossy().ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_sessions_never_share_paths() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path());
        let (audio, video) = variants();

        let mut seen = HashSet::new();
        for _ in 0..64 {
            let session = store.create_session(&audio, &video).await.unwrap();
            for path in session.paths() {
                assert!(seen.insert(path.to_path_buf()), "duplicate path {path:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_cleanup_guard_covers_all_paths() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path());
        let (audio, video) = variants();
        let session = store.create_session(&audio, &video).await.unwrap();

        for path in session.paths() {
            std::fs::write(path, b"x").unwrap();
        }
        let mut guard = session.cleanup_guard();
        assert_eq!(guard.token(), session.token);
        guard.release().await;
        for path in session.paths() {
            assert!(!path.exists());
        }
    }
}
