//! In-process collaborators for driving the download service end to end.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rust_muxdl::domain::{MediaDetails, StreamVariant};
use rust_muxdl::extractor::{ExtractorError, MetadataProvider};
use rust_muxdl::fetcher::{ByteStream, StreamFetcher};
use rust_muxdl::pipeline::{DownloadService, Multiplexer, ProgressPublisher};
use rust_muxdl::staging::StagingStore;
use rust_muxdl::{Error, Result};

/// Returns fixed details, or fails every call when `fail` is set.
pub struct ScriptedProvider {
    pub title: String,
    pub variants: Vec<StreamVariant>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            variants: vec![
                StreamVariant::new("A1", true, false, "m4a").with_mime_type("audio/mp4"),
                StreamVariant::new("V1", false, true, "mp4").with_mime_type("video/mp4"),
                StreamVariant::new("V2", false, true, "webm").with_mime_type("video/webm"),
                StreamVariant::new("C1", true, true, "mp4").with_mime_type("video/mp4"),
            ],
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("unused")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, url: &str) -> std::result::Result<MediaDetails, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtractorError::InvalidUrl(url.to_string()));
        }
        Ok(MediaDetails::new(url, &self.title, self.variants.clone()))
    }
}

/// Serves `<id>:<n>;` chunks per variant. Variants listed in `fail_ids`
/// yield one chunk and then an error. `open_delay` holds every open back.
pub struct MemoryFetcher {
    pub chunks: usize,
    pub fail_ids: Vec<String>,
    pub open_delay: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            chunks: 3,
            fail_ids: Vec::new(),
            open_delay: None,
        }
    }

    pub fn slow_to_open(delay: Duration) -> Self {
        Self {
            open_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn failing_on(id: &str) -> Self {
        Self {
            fail_ids: vec![id.to_string()],
            ..Self::new()
        }
    }

    pub fn expected_bytes(&self, id: &str) -> Vec<u8> {
        (0..self.chunks)
            .flat_map(|n| format!("{id}:{n};").into_bytes())
            .collect()
    }
}

#[async_trait]
impl StreamFetcher for MemoryFetcher {
    async fn open_stream(&self, _url: &str, variant: &StreamVariant) -> Result<ByteStream> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let id = variant.id.clone();
        if self.fail_ids.contains(&id) {
            let items = vec![
                Ok(Bytes::from(format!("{id}:0;"))),
                Err(Error::fetch(format!("{id} connection reset"))),
            ];
            return Ok(futures::stream::iter(items).boxed());
        }
        let items: Vec<Result<Bytes>> = (0..self.chunks)
            .map(|n| Ok(Bytes::from(format!("{id}:{n};"))))
            .collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Writes `video ++ audio` to the output and reports progress along the way.
/// Records the inputs it was given.
pub struct ConcatMuxer {
    pub fail: bool,
    pub inputs: std::sync::Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl ConcatMuxer {
    pub fn new() -> Self {
        Self {
            fail: false,
            inputs: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Multiplexer for ConcatMuxer {
    async fn run_mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        self.inputs
            .lock()
            .map_err(|_| Error::Other("poisoned".into()))?
            .push((video.to_path_buf(), audio.to_path_buf()));

        on_progress(0.0);
        if self.fail {
            return Err(Error::mux("encoder exited with status 1"));
        }
        let mut bytes = tokio::fs::read(video).await?;
        on_progress(50.0);
        bytes.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, bytes).await?;
        on_progress(100.0);
        Ok(())
    }
}

pub struct Harness {
    pub service: DownloadService,
    pub provider: Arc<ScriptedProvider>,
    pub muxer: Arc<ConcatMuxer>,
    pub staging_root: PathBuf,
}

pub fn harness(
    staging_root: &Path,
    provider: ScriptedProvider,
    fetcher: MemoryFetcher,
    muxer: ConcatMuxer,
) -> Harness {
    let provider = Arc::new(provider);
    let muxer = Arc::new(muxer);
    let service = DownloadService::new(
        provider.clone(),
        Arc::new(fetcher),
        muxer.clone(),
        StagingStore::new(staging_root),
        ProgressPublisher::default(),
    );
    Harness {
        service,
        provider,
        muxer,
        staging_root: staging_root.to_path_buf(),
    }
}

/// Files left in the staging root; a missing root counts as empty.
pub fn staged_files(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}
