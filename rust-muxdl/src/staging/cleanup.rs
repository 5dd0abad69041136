//! Guaranteed removal of a staging session's files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owns a set of staged paths and deletes them exactly once.
///
/// Release happens through [`CleanupGuard::release`] on the normal exit
/// paths, or on drop if nothing released it first (a dropped response body,
/// a cancelled request). Deletion never fails the caller: missing files are
/// ignored and any other error is logged.
#[derive(Debug)]
pub struct CleanupGuard {
    token: String,
    paths: Vec<PathBuf>,
    released: bool,
}

impl CleanupGuard {
    pub fn new(token: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            token: token.into(),
            paths,
            released: false,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete every guarded path. Later calls are no-ops.
    ///
    /// The guard counts as released only once every removal has run, so a
    /// release cut short by cancellation is finished by the drop.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        for path in &self.paths {
            log_removal(&self.token, path, tokio::fs::remove_file(path).await);
        }
        self.released = true;
        debug!(session = %self.token, "Staging session cleaned up");
    }

    /// Synchronous variant of [`release`](Self::release) for `Drop`, which
    /// cannot await.
    pub fn release_now(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        for path in &self.paths {
            log_removal(&self.token, path, std::fs::remove_file(path));
        }
        debug!(session = %self.token, "Staging session cleaned up");
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.released {
            self.release_now();
        }
    }
}

fn log_removal(token: &str, path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!(session = %token, path = %path.display(), "Removed staged file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            session = %token,
            path = %path.display(),
            error = %e,
            "Failed to remove staged file"
        ),
    }
}
