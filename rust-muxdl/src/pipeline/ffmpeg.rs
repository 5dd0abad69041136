//! FFmpeg-backed multiplexer.
//!
//! Both tracks are always re-encoded to a fixed codec pair rather than
//! stream-copied. That costs CPU time but yields a playable MP4 whatever the
//! source codecs were.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::mux::Multiplexer;
use crate::{Error, Result};

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// The codec pair every mux re-encodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxCodecs {
    pub audio: String,
    pub video: String,
}

impl Default for MuxCodecs {
    fn default() -> Self {
        Self {
            audio: "aac".to_string(),
            video: "libx264".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary_path: String,
    codecs: MuxCodecs,
}

impl FfmpegMuxer {
    pub fn new(binary_path: impl Into<String>, codecs: MuxCodecs) -> Self {
        Self {
            binary_path: binary_path.into(),
            codecs,
        }
    }

    pub fn codecs(&self) -> &MuxCodecs {
        &self.codecs
    }

    pub fn version(&self) -> Option<String> {
        process_utils::probe_version(&self.binary_path, "-version")
    }

    /// Build ffmpeg arguments: input 0 is video, input 1 is audio.
    fn build_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "info"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(["-progress".to_string(), "pipe:1".to_string()]);

        args.extend(["-i".to_string(), video.to_string_lossy().to_string()]);
        args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]);

        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        args.extend(["-map".to_string(), "1:a:0".to_string()]);

        args.extend(["-c:v".to_string(), self.codecs.video.clone()]);
        args.extend(["-c:a".to_string(), self.codecs.audio.clone()]);
        args.extend(["-strict".to_string(), "experimental".to_string()]);
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_PATH, MuxCodecs::default())
    }
}

#[async_trait]
impl Multiplexer for FfmpegMuxer {
    async fn run_mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        let args = self.build_args(video, audio, output);
        debug!("FFmpeg args: {:?}", args);

        let mut child = process_utils::media_command(&self.binary_path)
            .args(&args)
            .spawn()
            .map_err(|e| Error::mux(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::mux("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::mux("Failed to capture ffmpeg stderr"))?;

        // stderr carries the input duration and error messages; stdout carries
        // the machine-readable `-progress` stream.
        let (duration_tx, duration_rx) = watch::channel::<Option<f64>>(None);
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut last_error: Option<String> = None;
            let mut duration_known = false;
            while let Ok(Some(line)) = lines.next_line().await {
                if !duration_known && let Some(duration) = parse_duration_line(&line) {
                    duration_known = true;
                    let _ = duration_tx.send(Some(duration));
                }
                if line.to_lowercase().contains("error") {
                    warn!("ffmpeg: {}", line);
                    last_error = Some(line);
                } else {
                    debug!("ffmpeg: {}", line);
                }
            }
            last_error
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(position) = parse_progress_position(&line) else {
                        continue;
                    };
                    let duration = *duration_rx.borrow();
                    if let Some(duration) = duration {
                        on_progress(percent_of(position, duration));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(Error::mux(format!("Failed to read ffmpeg progress: {e}")));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::mux(format!("Failed to wait for ffmpeg: {e}")))?;
        let last_error = stderr_task.await.ok().flatten();

        if !status.success() {
            let reason = last_error.unwrap_or_else(|| "Unknown ffmpeg error".to_string());
            return Err(Error::mux(format!(
                "ffmpeg failed with exit code {}: {}",
                status.code().unwrap_or(-1),
                reason
            )));
        }

        info!(output = %output.display(), "ffmpeg finished");
        Ok(())
    }
}

/// Parse time string (HH:MM:SS.ms) to seconds.
pub fn parse_time(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse the input duration from a stderr line such as
/// `  Duration: 00:03:12.34, start: 0.000000, bitrate: 128 kb/s`.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let start = line.find("Duration:")?;
    let rest = &line[start + "Duration:".len()..];
    let end = rest.find(',').unwrap_or(rest.len());
    parse_time(&rest[..end]).filter(|d| *d > 0.0)
}

/// Parse the output position in seconds from a `-progress` line.
///
/// Both `out_time_us` and the misnamed `out_time_ms` are microseconds.
pub fn parse_progress_position(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value
            .trim()
            .parse::<i64>()
            .ok()
            .map(|us| us as f64 / 1_000_000.0),
        "out_time" => parse_time(value),
        _ => None,
    }
}

/// Percent of `duration` covered by `position`, clamped to [0, 100].
pub fn percent_of(position: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    (position / duration * 100.0).clamp(0.0, 100.0)
}
