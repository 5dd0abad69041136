//! Download requests and their validation.

use super::variant::{MediaDetails, StreamVariant};
use crate::{Error, Result};

/// What the caller asked to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One variant served as-is.
    Single(String),
    /// Separate audio and video variants to fetch and mux.
    Dual { audio_id: String, video_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub selection: Selection,
}

impl DownloadRequest {
    pub fn single(url: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selection: Selection::Single(id.into()),
        }
    }

    pub fn dual(
        url: impl Into<String>,
        audio_id: impl Into<String>,
        video_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            selection: Selection::Dual {
                audio_id: audio_id.into(),
                video_id: video_id.into(),
            },
        }
    }

    /// Build a request from loosely typed inputs such as query parameters.
    ///
    /// Blank values count as missing. Both ids present selects the dual path,
    /// exactly one selects the single path.
    pub fn from_parts(
        url: Option<&str>,
        audio_id: Option<&str>,
        video_id: Option<&str>,
    ) -> Result<Self> {
        let url = non_blank(url).ok_or_else(|| Error::validation("url is required"))?;
        let request = match (non_blank(audio_id), non_blank(video_id)) {
            (Some(audio), Some(video)) => Self::dual(url, audio, video),
            (Some(id), None) | (None, Some(id)) => Self::single(url, id),
            (None, None) => {
                return Err(Error::validation(
                    "an audio or video format id is required",
                ));
            }
        };
        Ok(request)
    }

    /// Reject requests that would fail before any side effect.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::validation("url is required"));
        }
        match &self.selection {
            Selection::Single(id) if id.trim().is_empty() => {
                Err(Error::validation("an audio or video format id is required"))
            }
            Selection::Dual { audio_id, video_id }
                if audio_id.trim().is_empty() || video_id.trim().is_empty() =>
            {
                Err(Error::validation("both audio and video format ids are required"))
            }
            _ => Ok(()),
        }
    }
}

/// A selection bound to concrete variants of a resolved source.
#[derive(Debug, Clone)]
pub enum ResolvedSelection {
    Single(StreamVariant),
    Dual {
        audio: StreamVariant,
        video: StreamVariant,
    },
}

impl ResolvedSelection {
    /// Bind `selection` against the resolved variants.
    ///
    /// The audio slot only accepts an audio-only variant and the video slot
    /// only a video-only one; a single selection may be any variant.
    pub fn bind(selection: &Selection, details: &MediaDetails) -> Result<Self> {
        match selection {
            Selection::Single(id) => details
                .find(id)
                .cloned()
                .map(Self::Single)
                .ok_or_else(|| Error::validation("requested format is not available")),
            Selection::Dual { audio_id, video_id } => {
                let audio = details.find_audio_only(audio_id);
                let video = details.find_video_only(video_id);
                match (audio, video) {
                    (Some(audio), Some(video)) => Ok(Self::Dual {
                        audio: audio.clone(),
                        video: video.clone(),
                    }),
                    _ => Err(Error::validation("invalid audio or video format")),
                }
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> MediaDetails {
        MediaDetails::new(
            "u1",
            "Title",
            vec![
                StreamVariant::new("A1", true, false, "m4a"),
                StreamVariant::new("V1", false, true, "mp4"),
                StreamVariant::new("C1", true, true, "mp4"),
            ],
        )
    }

    #[test]
    fn test_from_parts_requires_url() {
        let err = DownloadRequest::from_parts(None, Some("A1"), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = DownloadRequest::from_parts(Some("  "), Some("A1"), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_from_parts_requires_a_selection() {
        let err = DownloadRequest::from_parts(Some("u1"), None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = DownloadRequest::from_parts(Some("u1"), Some(""), Some(" ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_from_parts_picks_path() {
        let dual = DownloadRequest::from_parts(Some("u1"), Some("A1"), Some("V1")).unwrap();
        assert_eq!(dual, DownloadRequest::dual("u1", "A1", "V1"));

        let audio = DownloadRequest::from_parts(Some("u1"), Some("A1"), None).unwrap();
        assert_eq!(audio.selection, Selection::Single("A1".to_string()));

        let video = DownloadRequest::from_parts(Some("u1"), None, Some("V1")).unwrap();
        assert_eq!(video.selection, Selection::Single("V1".to_string()));
    }

    #[test]
    fn test_validate_rejects_hand_built_blank_ids() {
        assert!(DownloadRequest::dual("u1", "A1", "").validate().is_err());
        assert!(DownloadRequest::single("", "A1").validate().is_err());
        assert!(DownloadRequest::dual("u1", "A1", "V1").validate().is_ok());
    }

    #[test]
    fn test_bind_dual_checks_track_slots() {
        let details = details();
        let ok = ResolvedSelection::bind(
            &DownloadRequest::dual("u1", "A1", "V1").selection,
            &details,
        );
        assert!(matches!(ok, Ok(ResolvedSelection::Dual { .. })));

        // Swapped slots and combined variants are rejected.
        for (audio, video) in [("V1", "A1"), ("C1", "V1"), ("A1", "C1"), ("A1", "missing")] {
            let selection = DownloadRequest::dual("u1", audio, video).selection;
            let err = ResolvedSelection::bind(&selection, &details).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{audio}/{video}");
        }
    }

    #[test]
    fn test_bind_single_accepts_any_variant() {
        let details = details();
        for id in ["A1", "V1", "C1"] {
            let selection = DownloadRequest::single("u1", id).selection;
            match ResolvedSelection::bind(&selection, &details).unwrap() {
                ResolvedSelection::Single(variant) => assert_eq!(variant.id, id),
                other => panic!("unexpected selection {other:?}"),
            }
        }

        let selection = DownloadRequest::single("u1", "nope").selection;
        assert!(ResolvedSelection::bind(&selection, &details).is_err());
    }
}
