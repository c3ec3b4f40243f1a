use std::path::PathBuf;

/// Frame rate used for every export run.
pub const EXPORT_FPS: u32 = 30;

/// Where a slide's pixels come from. Manifests usually reference files on
/// disk; callers embedding the crate can hand over raw encoded bytes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// One unit of the sequence: an image plus an optional caption.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Slide {
    #[serde(rename = "image")]
    pub source: ImageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Slide {
    pub fn has_caption(&self) -> bool {
        self.caption
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// Output resolution tier. Each tier maps to a fixed geometry/bitrate pair;
/// the table is not caller-tunable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Quality {
    #[serde(rename = "720p")]
    Q720p,
    #[serde(rename = "1080p")]
    Q1080p,
    #[serde(rename = "4k")]
    Q4k,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityPreset {
    pub width: u32,
    pub height: u32,
    pub bitrate: u32, // bits per second
}

impl Quality {
    pub fn preset(self) -> QualityPreset {
        match self {
            Quality::Q720p => QualityPreset {
                width: 1280,
                height: 720,
                bitrate: 5_000_000,
            },
            Quality::Q1080p => QualityPreset {
                width: 1920,
                height: 1080,
                bitrate: 8_000_000,
            },
            Quality::Q4k => QualityPreset {
                width: 3840,
                height: 2160,
                bitrate: 20_000_000,
            },
        }
    }
}

/// Container/codec family preference, resolved once at run start to one
/// concrete MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    Auto,
    Webm,
    Mp4,
}

/// Blend function used between every adjacent pair of slides in a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionStyle {
    Fade,
    Slide,
    Zoom,
}

/// Still/transition duration pair. Two presets exist because the original
/// product shipped both; neither is "the" constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingPreset {
    /// 2.5s per slide, 0.6s transition.
    #[default]
    Classic,
    /// 3.0s per slide, 0.5s transition.
    Relaxed,
}

impl TimingPreset {
    pub fn still_ms(self) -> u64 {
        match self {
            TimingPreset::Classic => 2500,
            TimingPreset::Relaxed => 3000,
        }
    }

    pub fn transition_ms(self) -> u64 {
        match self {
            TimingPreset::Classic => 600,
            TimingPreset::Relaxed => 500,
        }
    }
}

/// Immutable configuration for one export run.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExportOptions {
    pub quality: Quality,
    pub format: FormatHint,
    pub transition: TransitionStyle,
    #[serde(default)]
    pub timing: TimingPreset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_table_is_fixed() {
        assert_eq!(
            Quality::Q720p.preset(),
            QualityPreset {
                width: 1280,
                height: 720,
                bitrate: 5_000_000
            }
        );
        assert_eq!(
            Quality::Q1080p.preset(),
            QualityPreset {
                width: 1920,
                height: 1080,
                bitrate: 8_000_000
            }
        );
        assert_eq!(
            Quality::Q4k.preset(),
            QualityPreset {
                width: 3840,
                height: 2160,
                bitrate: 20_000_000
            }
        );
    }

    #[test]
    fn timing_presets_match_both_call_sites() {
        assert_eq!(TimingPreset::Classic.still_ms(), 2500);
        assert_eq!(TimingPreset::Classic.transition_ms(), 600);
        assert_eq!(TimingPreset::Relaxed.still_ms(), 3000);
        assert_eq!(TimingPreset::Relaxed.transition_ms(), 500);
    }

    #[test]
    fn json_roundtrip() {
        let slides = vec![
            Slide {
                source: ImageSource::Path(PathBuf::from("a.png")),
                caption: Some("hello".to_string()),
            },
            Slide {
                source: ImageSource::Path(PathBuf::from("b.png")),
                caption: None,
            },
        ];
        let s = serde_json::to_string_pretty(&slides).unwrap();
        let de: Vec<Slide> = serde_json::from_str(&s).unwrap();
        assert_eq!(de.len(), 2);
        assert!(de[0].has_caption());
        assert!(!de[1].has_caption());

        let opts = ExportOptions {
            quality: Quality::Q1080p,
            format: FormatHint::Auto,
            transition: TransitionStyle::Fade,
            timing: TimingPreset::Classic,
        };
        let s = serde_json::to_string(&opts).unwrap();
        assert!(s.contains("\"1080p\""));
        assert!(s.contains("\"auto\""));
        let de: ExportOptions = serde_json::from_str(&s).unwrap();
        assert_eq!(de.quality, Quality::Q1080p);
    }

    #[test]
    fn manifest_slide_parses_from_plain_path() {
        let de: Slide = serde_json::from_str(r#"{ "image": "photos/a.jpg" }"#).unwrap();
        assert!(matches!(de.source, ImageSource::Path(_)));
        assert!(de.caption.is_none());
    }

    #[test]
    fn blank_caption_counts_as_absent() {
        let slide = Slide {
            source: ImageSource::Path(PathBuf::from("a.png")),
            caption: Some("   ".to_string()),
        };
        assert!(!slide.has_caption());
    }

    #[test]
    fn timing_default_is_classic() {
        let de: ExportOptions = serde_json::from_str(
            r#"{ "quality": "720p", "format": "webm", "transition": "zoom" }"#,
        )
        .unwrap();
        assert_eq!(de.timing, TimingPreset::Classic);
    }
}
