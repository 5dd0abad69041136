//! The deliverable of a download: a named, typed byte stream.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::service::{DownloadState, transition};
use crate::fetcher::ByteStream;
use crate::staging::CleanupGuard;
use crate::{Error, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// A download ready to be delivered to the client.
///
/// The body is consumed at most once. Dropping it before the end releases
/// whatever it holds, including staged files.
pub struct DownloadOutput {
    pub filename: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for DownloadOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOutput")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl DownloadOutput {
    /// Copy the whole body into `sink`, returning the number of bytes
    /// written. Upstream errors keep their class; sink errors are
    /// `Error::Streaming`.
    pub async fn write_to<W>(self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut body = self.body;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| Error::streaming(format!("client write failed: {e}")))?;
            written += chunk.len() as u64;
        }
        sink.flush()
            .await
            .map_err(|e| Error::streaming(format!("client flush failed: {e}")))?;
        debug!(filename = %self.filename, bytes = written, "Output delivered");
        Ok(written)
    }
}

/// Streams a muxed file from disk and removes the session's staged files
/// once it is exhausted, fails, or is dropped.
///
/// At the end of the file the removal runs as an awaited step of the stream
/// itself: the terminal item is yielded only after the staged files are gone.
pub struct StagedOutput {
    url: String,
    // Declared before the guard so the file handle closes first on drop.
    phase: Phase,
    guard: Option<CleanupGuard>,
}

enum Phase {
    Reading(ReaderStream<tokio::fs::File>),
    Releasing(BoxFuture<'static, ()>, Option<Error>),
    Done,
}

impl StagedOutput {
    pub fn new(url: impl Into<String>, file: tokio::fs::File, guard: CleanupGuard) -> Self {
        Self {
            url: url.into(),
            phase: Phase::Reading(ReaderStream::new(file)),
            guard: Some(guard),
        }
    }

    /// Close the file and start removing the staged files. `error` is
    /// yielded once removal has finished.
    fn begin_release(&mut self, error: Option<Error>) {
        let guard = self.guard.take();
        let url = self.url.clone();
        let release = async move {
            if let Some(mut guard) = guard {
                guard.release().await;
            }
            transition(&url, DownloadState::CleanedUp);
        };
        self.phase = Phase::Releasing(release.boxed(), error);
    }
}

impl Stream for StagedOutput {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.as_mut().get_mut();
        loop {
            match &mut this.phase {
                Phase::Reading(reader) => match ready!(Pin::new(reader).poll_next(cx)) {
                    Some(Ok(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                    Some(Err(e)) => this.begin_release(Some(Error::streaming(format!(
                        "cannot read muxed output: {e}"
                    )))),
                    None => this.begin_release(None),
                },
                Phase::Releasing(release, error) => {
                    ready!(release.as_mut().poll(cx));
                    let error = error.take();
                    this.phase = Phase::Done;
                    return Poll::Ready(error.map(Err));
                }
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        self.phase = Phase::Done;
        if let Some(mut guard) = self.guard.take() {
            guard.release_now();
            transition(&self.url, DownloadState::CleanedUp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct BrokenSink;

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "client went away",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn output(body: ByteStream) -> DownloadOutput {
        DownloadOutput {
            filename: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            content_length: None,
            body,
        }
    }

    #[tokio::test]
    async fn test_write_to_copies_body() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ])
        .boxed();
        let mut sink = Vec::new();
        let written = output(body).write_to(&mut sink).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(sink, b"abcd");
    }

    #[tokio::test]
    async fn test_sink_failure_is_streaming_error() {
        let body = futures::stream::iter(vec![Ok(Bytes::from_static(b"ab"))]).boxed();
        let err = output(body).write_to(&mut BrokenSink).await.unwrap_err();
        assert!(matches!(err, Error::Streaming(_)));
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_class() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::fetch("reset")),
        ])
        .boxed();
        let mut sink = Vec::new();
        let err = output(body).write_to(&mut sink).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(sink, b"ab");
    }

    #[tokio::test]
    async fn test_staged_output_cleans_up_after_last_chunk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output-1.mp4");
        std::fs::write(&path, b"muxed bytes").unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let mut stream = StagedOutput::new("u1", file, CleanupGuard::new("1", vec![path.clone()]));
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, b"muxed bytes");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_staged_output_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output-2.mp4");
        std::fs::write(&path, vec![0u8; 64 * 1024]).unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let mut stream = StagedOutput::new("u2", file, CleanupGuard::new("2", vec![path.clone()]));
        assert!(stream.next().await.is_some());
        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_staged_output_released_once_and_stays_ended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output-3.mp4");
        std::fs::write(&path, b"muxed").unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let mut stream = StagedOutput::new("u3", file, CleanupGuard::new("3", vec![path.clone()]));
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"muxed"));
        assert!(stream.next().await.is_none());
        assert!(!path.exists());

        // A later file at the same path is not touched by further polls or the drop.
        std::fs::write(&path, b"other").unwrap();
        assert!(stream.next().await.is_none());
        drop(stream);
        assert!(path.exists());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_staged_output_logs_cleaned_up_state() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output-4.mp4");
        std::fs::write(&path, b"muxed").unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let stream = StagedOutput::new("u4", file, CleanupGuard::new("4", vec![path.clone()]));
        output(stream.boxed()).write_to(&mut Vec::new()).await.unwrap();

        let text = logs.text();
        assert!(text.contains("state=CLEANED_UP"), "{text}");
        assert_eq!(text.matches("CLEANED_UP").count(), 1);
    }
}
