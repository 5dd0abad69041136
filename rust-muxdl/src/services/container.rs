//! Service container: builds the concrete collaborators and wires them into
//! the download service.

use std::sync::Arc;
use tracing::{info, warn};

use crate::Result;
use crate::config::AppConfig;
use crate::extractor::YtDlpProvider;
use crate::fetcher::HttpStreamFetcher;
use crate::pipeline::{DownloadService, FfmpegMuxer, ProgressPublisher};
use crate::staging::StagingStore;

/// Holds the process-wide services.
pub struct ServiceContainer {
    pub download_service: Arc<DownloadService>,
}

impl ServiceContainer {
    /// Build every service from `config`. The staging root is created here.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        info!("Initializing service container");

        let provider =
            YtDlpProvider::new(&config.ytdlp_path).with_extra_args(config.ytdlp_args.clone());
        match provider.version() {
            Some(version) => info!(version = %version, "yt-dlp available"),
            None => warn!(
                path = %config.ytdlp_path,
                "yt-dlp not found; format resolution will fail"
            ),
        }

        let muxer = FfmpegMuxer::new(&config.ffmpeg_path, config.codecs.clone());
        match muxer.version() {
            Some(version) => info!(version = %version, "ffmpeg available"),
            None => warn!(
                path = %config.ffmpeg_path,
                "ffmpeg not found; dual-stream downloads will fail"
            ),
        }

        let fetcher = HttpStreamFetcher::new()?;

        let staging = StagingStore::new(&config.staging_dir);
        staging.ensure_root().await?;
        info!(root = %staging.root().display(), "Staging directory ready");

        let download_service = Arc::new(DownloadService::new(
            Arc::new(provider),
            Arc::new(fetcher),
            Arc::new(muxer),
            staging,
            ProgressPublisher::default(),
        ));

        info!(
            audio_codec = %config.codecs.audio,
            video_codec = %config.codecs.video,
            "Service container initialized"
        );
        Ok(Self { download_service })
    }
}
