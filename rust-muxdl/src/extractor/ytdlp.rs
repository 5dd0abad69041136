use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tracing::debug;

use super::{ExtractorError, MetadataProvider};
use crate::domain::{MediaDetails, StreamVariant};

pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";

/// Extraction provider backed by the `yt-dlp` binary in JSON mode.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    binary_path: String,
    extra_args: Vec<String>,
}

impl YtDlpProvider {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn version(&self) -> Option<String> {
        process_utils::probe_version(&self.binary_path, "--version")
    }

    fn check_url(url: &str) -> Result<(), ExtractorError> {
        let parsed = url::Url::parse(url).map_err(|e| ExtractorError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ExtractorError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            ))),
        }
    }

    /// Fixed flags, then the configured extras, then `--` so the url is never
    /// read as an option.
    fn json_args<'a>(&'a self, url: &'a str) -> Vec<&'a str> {
        let mut args = vec!["-J", "--no-playlist", "--no-warnings"];
        args.extend(self.extra_args.iter().map(String::as_str));
        args.extend(["--", url]);
        args
    }

    async fn run_ytdlp_json(&self, url: &str) -> Result<YtDlpInfo, ExtractorError> {
        let mut cmd = process_utils::tokio_command(&self.binary_path);
        cmd.args(self.json_args(url));

        let out = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExtractorError::Other(format!("Failed to spawn yt-dlp: {e}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(map_ytdlp_error(&stderr));
        }

        Ok(serde_json::from_slice(&out.stdout)?)
    }
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP_PATH)
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str) -> Result<MediaDetails, ExtractorError> {
        Self::check_url(url)?;
        let info = self.run_ytdlp_json(url).await?;
        Ok(info.into_details(url))
    }
}

fn map_ytdlp_error(stderr: &str) -> ExtractorError {
    let lower = stderr.to_lowercase();
    if lower.contains("unsupported url") {
        return ExtractorError::UnsupportedUrl;
    }
    if lower.contains("video unavailable") || lower.contains("private video") {
        return ExtractorError::Unavailable(last_line(stderr));
    }
    if stderr.is_empty() {
        return ExtractorError::Other("yt-dlp exited with an error".to_string());
    }
    ExtractorError::Other(last_line(stderr))
}

fn last_line(text: &str) -> String {
    text.lines().last().unwrap_or(text).trim().to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

impl YtDlpInfo {
    fn into_details(self, url: &str) -> MediaDetails {
        let variants: Vec<StreamVariant> = self
            .formats
            .into_iter()
            .filter(|f| {
                let fetchable = f.is_fetchable();
                if !fetchable {
                    debug!(
                        format_id = %f.format_id,
                        protocol = ?f.protocol,
                        "Skipping non-http format"
                    );
                }
                fetchable
            })
            .map(YtDlpFormat::into_variant)
            .collect();

        MediaDetails::new(url, self.title.unwrap_or_default(), variants)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    tbr: Option<f64>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    vbr: Option<f64>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpFormat {
    fn is_fetchable(&self) -> bool {
        let has_url = self.url.as_deref().is_some_and(|u| !u.is_empty());
        let plain_http = match self.protocol.as_deref() {
            None => true,
            Some(p) => p == "http" || p == "https",
        };
        has_url && plain_http
    }

    fn into_variant(self) -> StreamVariant {
        let has_audio = has_codec(self.acodec.as_deref());
        let has_video = has_codec(self.vcodec.as_deref());
        let container = self.ext.clone().unwrap_or_default();

        let codecs: Vec<&str> = [self.vcodec.as_deref(), self.acodec.as_deref()]
            .into_iter()
            .flatten()
            .filter(|c| has_codec(Some(*c)))
            .collect();
        let mime_type = mime_type_for(&container, has_video, &codecs);

        let quality_label = match (self.height, self.format_note.as_deref()) {
            (Some(height), _) if has_video => format!("{height}p"),
            (_, Some(note)) if !note.is_empty() => note.to_string(),
            _ => String::new(),
        };
        let bitrate = self.tbr.or(self.vbr).or(self.abr);

        let mut headers: Vec<(String, String)> = self.http_headers.into_iter().collect();
        headers.sort();

        StreamVariant::new(self.format_id, has_audio, has_video, container)
            .with_mime_type(mime_type)
            .with_quality_label(quality_label)
            .with_bitrate(bitrate)
            .with_url(self.url.unwrap_or_default())
            .with_headers(headers)
    }
}

/// yt-dlp reports a missing track as the literal codec "none".
fn has_codec(codec: Option<&str>) -> bool {
    codec.is_some_and(|c| !c.is_empty() && c != "none")
}

fn mime_type_for(container: &str, has_video: bool, codecs: &[&str]) -> String {
    let base = match (container.to_ascii_lowercase().as_str(), has_video) {
        ("mp4", true) => "video/mp4",
        ("mp4" | "m4a", false) => "audio/mp4",
        ("webm", true) => "video/webm",
        ("webm", false) => "audio/webm",
        ("3gp", _) => "video/3gpp",
        ("mp3", _) => "audio/mpeg",
        ("ogg" | "opus", _) => "audio/ogg",
        ("flv", _) => "video/x-flv",
        _ => "application/octet-stream",
    };
    if codecs.is_empty() {
        base.to_string()
    } else {
        format!("{}; codecs=\"{}\"", base, codecs.join(", "))
    }
}
