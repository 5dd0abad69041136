//! Service configuration read from environment variables.

use std::path::PathBuf;
use tracing::warn;

use crate::extractor::DEFAULT_YTDLP_PATH;
use crate::pipeline::ffmpeg::DEFAULT_FFMPEG_PATH;
use crate::pipeline::MuxCodecs;
use crate::staging::DEFAULT_STAGING_DIR_NAME;

pub const DEFAULT_LOG_DIR: &str = "logs";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// ffmpeg binary (`FFMPEG_PATH`)
    pub ffmpeg_path: String,
    /// yt-dlp binary (`YTDLP_PATH`)
    pub ytdlp_path: String,
    /// Extra yt-dlp flags, whitespace separated (`YTDLP_EXTRA_ARGS`)
    pub ytdlp_args: Vec<String>,
    /// Staging root (`MUXDL_STAGING_DIR`)
    pub staging_dir: PathBuf,
    /// Re-encode target (`MUXDL_AUDIO_CODEC`, `MUXDL_VIDEO_CODEC`)
    pub codecs: MuxCodecs,
    /// Log file directory (`LOG_DIR`)
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            ytdlp_path: DEFAULT_YTDLP_PATH.to_string(),
            ytdlp_args: Vec::new(),
            staging_dir: std::env::temp_dir().join(DEFAULT_STAGING_DIR_NAME),
            codecs: MuxCodecs::default(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get("FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }
        if let Some(path) = get("YTDLP_PATH") {
            config.ytdlp_path = path;
        }
        if let Some(args) = get("YTDLP_EXTRA_ARGS") {
            config.ytdlp_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(dir) = get("MUXDL_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Some(codec) = get("MUXDL_AUDIO_CODEC") {
            config.codecs.audio = codec;
        }
        if let Some(codec) = get("MUXDL_VIDEO_CODEC") {
            config.codecs.video = codec;
        }
        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        for codec in [&config.codecs.audio, &config.codecs.video] {
            if codec == "copy" {
                warn!("Stream copy configured as mux codec; output may not be playable");
            }
        }

        config
    }
}
