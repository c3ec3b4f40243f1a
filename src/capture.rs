use std::{
    collections::HashSet,
    io::{Read as _, Write as _},
    process::{Child, ChildStdin, Command, Stdio},
    sync::OnceLock,
    thread::JoinHandle,
};

use crossbeam_channel::{Receiver, unbounded};

use crate::{
    error::{SlidecastError, SlidecastResult},
    model::FormatHint,
    sequencer::FrameSink,
    surface::RenderSurface,
};

/// Candidate MIME types for a format hint, best first. The auto list prefers
/// higher-quality WebM codecs, then falls through to the MP4 family.
pub fn mime_candidates(hint: FormatHint) -> &'static [&'static str] {
    const WEBM: &[&str] = &[
        "video/webm;codecs=vp9",
        "video/webm;codecs=vp8",
        "video/webm",
    ];
    const MP4: &[&str] = &["video/mp4;codecs=avc1", "video/mp4"];
    const AUTO: &[&str] = &[
        "video/webm;codecs=vp9",
        "video/webm;codecs=vp8",
        "video/webm",
        "video/mp4;codecs=avc1",
        "video/mp4",
    ];
    match hint {
        FormatHint::Webm => WEBM,
        FormatHint::Mp4 => MP4,
        FormatHint::Auto => AUTO,
    }
}

/// Safe default when nothing probes as supported; encoder setup will fail
/// cleanly later if the host really cannot encode it.
pub const FALLBACK_MIME: &str = "video/webm";

/// Asks the host whether it can encode a given MIME type. A strategy
/// interface so the pipeline never hard-codes platform capability checks.
pub trait CodecProbe {
    fn supports(&self, mime: &str) -> bool;
}

/// Resolve the format hint to one concrete MIME type: first supported
/// candidate in order, else [`FALLBACK_MIME`]. Called exactly once per run,
/// before any frame is drawn.
pub fn negotiate_mime(hint: FormatHint, probe: &dyn CodecProbe) -> String {
    mime_candidates(hint)
        .iter()
        .find(|mime| probe.supports(mime))
        .copied()
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

/// The ffmpeg video encoder that a MIME type maps onto.
pub fn encoder_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "video/webm;codecs=vp9" => Some("libvpx-vp9"),
        "video/webm;codecs=vp8" | "video/webm" => Some("libvpx"),
        "video/mp4;codecs=avc1" | "video/mp4" => Some("libx264"),
        _ => None,
    }
}

fn container_for_mime(mime: &str) -> &'static str {
    if mime.starts_with("video/mp4") {
        "mp4"
    } else {
        "webm"
    }
}

/// Probes the local ffmpeg binary once and answers from its encoder list.
/// The probe result lives inside the owned value, not in global state.
#[derive(Default)]
pub struct FfmpegProbe {
    encoders: OnceLock<HashSet<String>>,
}

impl FfmpegProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn encoder_set(&self) -> &HashSet<String> {
        self.encoders.get_or_init(|| {
            let Ok(out) = Command::new("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .stderr(Stdio::null())
                .output()
            else {
                return HashSet::new();
            };
            if !out.status.success() {
                return HashSet::new();
            }
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|line| {
                    // Lines look like: " V....D libx264   H.264 ..."
                    let mut cols = line.split_whitespace();
                    let flags = cols.next()?;
                    let name = cols.next()?;
                    flags.starts_with('V').then(|| name.to_string())
                })
                .collect()
        })
    }
}

impl CodecProbe for FfmpegProbe {
    fn supports(&self, mime: &str) -> bool {
        encoder_for_mime(mime)
            .is_some_and(|enc| self.encoder_set().contains(enc))
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The finished export: one immutable encoded byte stream plus the MIME
/// type it was encoded as.
#[derive(Clone, Debug)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl MediaBlob {
    /// File extension for the download collaborator, inferred from the MIME
    /// type.
    pub fn extension(&self) -> &'static str {
        if self.mime.contains("mp4") { "mp4" } else { "webm" }
    }
}

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: u32,
    pub mime: String,
}

impl CaptureConfig {
    pub fn validate(&self) -> SlidecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SlidecastError::validation(
                "capture width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(SlidecastError::validation("capture fps must be non-zero"));
        }
        if self.bitrate == 0 {
            return Err(SlidecastError::validation("capture bitrate must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(SlidecastError::validation(
                "capture width/height must be even",
            ));
        }
        if encoder_for_mime(&self.mime).is_none() {
            return Err(SlidecastError::validation(format!(
                "unknown capture mime '{}'",
                self.mime
            )));
        }
        Ok(())
    }
}

/// Live recording of the render surface into an encoded stream.
///
/// Frames are piped raw into an ffmpeg child; the encoded container bytes
/// stream back out of the child's stdout and are accumulated as chunks, in
/// arrival order, on a reader thread. `finish()` performs the stop
/// handshake: close stdin, join the reader, wait for the child, then
/// concatenate the chunks into the final blob.
///
/// Dropping an unfinished session kills the encoder so no run leaves a
/// dangling child process.
pub struct CaptureSession {
    cfg: CaptureConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
    frame_len: usize,
    frames_captured: u64,
}

impl CaptureSession {
    pub fn start(cfg: CaptureConfig) -> SlidecastResult<Self> {
        cfg.validate()?;

        let encoder = encoder_for_mime(&cfg.mime)
            .ok_or_else(|| SlidecastError::encode("no encoder for negotiated mime"))?;
        let container = container_for_mime(&cfg.mime);

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            encoder,
            "-b:v",
            &cfg.bitrate.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
        if container == "mp4" {
            // MP4 to a pipe needs a fragmented layout; the muxer cannot seek
            // back to write the moov atom.
            cmd.args(["-movflags", "frag_keyframe+empty_moov"]);
        }
        cmd.args(["-f", container, "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            SlidecastError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlidecastError::encode("failed to open encoder stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SlidecastError::encode("failed to open encoder stdout"))?;

        // Encoded chunks arrive on their own cadence; drain them off-thread
        // so the encoder never blocks on a full stdout pipe.
        let (tx, rx) = unbounded::<Vec<u8>>();
        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 64 * 1024];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(
            mime = %cfg.mime,
            encoder,
            container,
            width = cfg.width,
            height = cfg.height,
            "capture session started"
        );

        Ok(Self {
            frame_len: (cfg.width as usize) * (cfg.height as usize) * 4,
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            chunks: rx,
            reader: Some(reader),
            frames_captured: 0,
        })
    }

    pub fn mime(&self) -> &str {
        &self.cfg.mime
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Sample the surface: push one raw frame into the encoder.
    pub fn capture_frame(&mut self, surface: &RenderSurface) -> SlidecastResult<()> {
        if surface.width() != self.cfg.width || surface.height() != self.cfg.height {
            return Err(SlidecastError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                surface.width(),
                surface.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        debug_assert_eq!(surface.data().len(), self.frame_len);

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SlidecastError::encode("capture session already finalized"));
        };
        stdin.write_all(surface.data()).map_err(|e| {
            SlidecastError::encode(format!("failed to write frame to encoder: {e}"))
        })?;
        self.frames_captured += 1;
        Ok(())
    }

    /// Stop recording and assemble the blob. Waits for the encoder's own
    /// shutdown before concatenating: closing stdin signals end-of-stream,
    /// the reader thread drains until stdout closes, and the child's exit
    /// status is the stop acknowledgment.
    pub fn finish(mut self) -> SlidecastResult<MediaBlob> {
        drop(self.stdin.take());

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        let mut child = self
            .child
            .take()
            .ok_or_else(|| SlidecastError::encode("capture session already finalized"))?;
        let output = child
            .wait_with_output()
            .map_err(|e| SlidecastError::encode(format!("failed to wait for encoder: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlidecastError::encode(format!(
                "encoder exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut bytes = Vec::new();
        for chunk in self.chunks.try_iter() {
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(SlidecastError::encode("encoder produced no output"));
        }

        tracing::debug!(
            frames = self.frames_captured,
            bytes = bytes.len(),
            "capture session finished"
        );
        Ok(MediaBlob {
            bytes,
            mime: self.cfg.mime.clone(),
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
            if let Some(reader) = self.reader.take() {
                let _ = reader.join();
            }
            tracing::debug!("capture session dropped before finish; encoder killed");
        }
    }
}

impl FrameSink for CaptureSession {
    fn capture(&mut self, surface: &RenderSurface) -> SlidecastResult<()> {
        self.capture_frame(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe(Vec<&'static str>);

    impl CodecProbe for FakeProbe {
        fn supports(&self, mime: &str) -> bool {
            self.0.iter().any(|m| *m == mime)
        }
    }

    #[test]
    fn auto_prefers_vp9_when_supported() {
        let probe = FakeProbe(vec!["video/webm;codecs=vp9", "video/mp4"]);
        assert_eq!(
            negotiate_mime(FormatHint::Auto, &probe),
            "video/webm;codecs=vp9"
        );
    }

    #[test]
    fn auto_falls_through_to_mp4_family() {
        let probe = FakeProbe(vec!["video/mp4"]);
        assert_eq!(negotiate_mime(FormatHint::Auto, &probe), "video/mp4");
    }

    #[test]
    fn hint_restricts_candidates_to_one_family() {
        let probe = FakeProbe(vec!["video/webm;codecs=vp9", "video/mp4;codecs=avc1"]);
        assert_eq!(
            negotiate_mime(FormatHint::Mp4, &probe),
            "video/mp4;codecs=avc1"
        );
        assert_eq!(
            negotiate_mime(FormatHint::Webm, &probe),
            "video/webm;codecs=vp9"
        );
    }

    #[test]
    fn nothing_supported_falls_back_to_webm() {
        let probe = FakeProbe(vec![]);
        assert_eq!(negotiate_mime(FormatHint::Auto, &probe), FALLBACK_MIME);
        assert_eq!(negotiate_mime(FormatHint::Mp4, &probe), FALLBACK_MIME);
    }

    #[test]
    fn encoder_mapping_covers_all_candidates() {
        for hint in [FormatHint::Auto, FormatHint::Webm, FormatHint::Mp4] {
            for mime in mime_candidates(hint) {
                assert!(encoder_for_mime(mime).is_some(), "no encoder for {mime}");
            }
        }
        assert!(encoder_for_mime("video/ogg").is_none());
    }

    #[test]
    fn blob_extension_follows_mime() {
        let webm = MediaBlob {
            bytes: vec![1],
            mime: "video/webm;codecs=vp9".to_string(),
        };
        assert_eq!(webm.extension(), "webm");

        let mp4 = MediaBlob {
            bytes: vec![1],
            mime: "video/mp4".to_string(),
        };
        assert_eq!(mp4.extension(), "mp4");
    }

    #[test]
    fn config_validation_catches_bad_values() {
        let base = CaptureConfig {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: 5_000_000,
            mime: "video/webm".to_string(),
        };
        assert!(base.validate().is_ok());

        assert!(
            CaptureConfig {
                width: 0,
                ..base.clone()
            }
            .validate()
            .is_err()
        );
        assert!(
            CaptureConfig {
                height: 721,
                ..base.clone()
            }
            .validate()
            .is_err()
        );
        assert!(
            CaptureConfig {
                fps: 0,
                ..base.clone()
            }
            .validate()
            .is_err()
        );
        assert!(
            CaptureConfig {
                bitrate: 0,
                ..base.clone()
            }
            .validate()
            .is_err()
        );
        assert!(
            CaptureConfig {
                mime: "video/ogg".to_string(),
                ..base
            }
            .validate()
            .is_err()
        );
    }
}
