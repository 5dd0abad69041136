//! Stream variants and their audio/video classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One encoding/container option offered for a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamVariant {
    /// Provider format identifier.
    pub id: String,
    pub has_audio: bool,
    pub has_video: bool,
    /// Container extension, e.g. "mp4", "webm", "m4a".
    pub container: String,
    pub mime_type: String,
    /// Human readable quality, e.g. "1080p" or "medium".
    pub quality_label: String,
    /// Total bitrate in kbit/s, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
    /// Direct media URL. Never serialized: signed URLs stay server-side.
    #[serde(skip)]
    pub url: String,
    /// HTTP headers the media host expects when fetching `url`.
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
}

impl StreamVariant {
    pub fn new(
        id: impl Into<String>,
        has_audio: bool,
        has_video: bool,
        container: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            has_audio,
            has_video,
            container: container.into(),
            mime_type: String::new(),
            quality_label: String::new(),
            bitrate: None,
            url: String::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_quality_label(mut self, label: impl Into<String>) -> Self {
        self.quality_label = label.into();
        self
    }

    pub fn with_bitrate(mut self, bitrate: Option<f64>) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Classification of this variant, `None` when it carries neither track.
    pub fn kind(&self) -> Option<VariantKind> {
        VariantKind::of(self.has_audio, self.has_video)
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind() == Some(VariantKind::AudioOnly)
    }

    pub fn is_video_only(&self) -> bool {
        self.kind() == Some(VariantKind::VideoOnly)
    }

    /// File extension to use for this variant on disk.
    pub fn extension(&self) -> &str {
        if self.container.is_empty() {
            "bin"
        } else {
            &self.container
        }
    }
}

impl fmt::Display for StreamVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(
                f,
                "{} ({}, {}, {})",
                self.id, kind, self.container, self.quality_label
            ),
            None => write!(f, "{} (no media, {})", self.id, self.container),
        }
    }
}

/// Which tracks a variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    AudioOnly,
    VideoOnly,
    Combined,
}

impl VariantKind {
    pub fn of(has_audio: bool, has_video: bool) -> Option<Self> {
        match (has_audio, has_video) {
            (true, false) => Some(Self::AudioOnly),
            (false, true) => Some(Self::VideoOnly),
            (true, true) => Some(Self::Combined),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioOnly => "audio-only",
            Self::VideoOnly => "video-only",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variants of one source partitioned by the tracks they carry.
///
/// Every variant with at least one track lands in exactly one partition,
/// preserving the provider's order within each partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantCatalog {
    pub audio_only: Vec<StreamVariant>,
    pub video_only: Vec<StreamVariant>,
    pub combined: Vec<StreamVariant>,
}

impl VariantCatalog {
    pub fn partition<'a>(variants: impl IntoIterator<Item = &'a StreamVariant>) -> Self {
        let mut catalog = Self::default();
        for variant in variants {
            match variant.kind() {
                Some(VariantKind::AudioOnly) => catalog.audio_only.push(variant.clone()),
                Some(VariantKind::VideoOnly) => catalog.video_only.push(variant.clone()),
                Some(VariantKind::Combined) => catalog.combined.push(variant.clone()),
                None => {}
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.audio_only.len() + self.video_only.len() + self.combined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the extraction provider returns for one source URL.
#[derive(Debug, Clone, Default)]
pub struct MediaDetails {
    /// The source page URL the details were resolved from.
    pub url: String,
    pub title: String,
    /// Raw variants in provider order.
    pub variants: Vec<StreamVariant>,
}

impl MediaDetails {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        variants: Vec<StreamVariant>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            variants,
        }
    }

    pub fn catalog(&self) -> VariantCatalog {
        VariantCatalog::partition(&self.variants)
    }

    pub fn find(&self, id: &str) -> Option<&StreamVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn find_audio_only(&self, id: &str) -> Option<&StreamVariant> {
        self.variants.iter().find(|v| v.id == id && v.is_audio_only())
    }

    pub fn find_video_only(&self, id: &str) -> Option<&StreamVariant> {
        self.variants.iter().find(|v| v.id == id && v.is_video_only())
    }
}
