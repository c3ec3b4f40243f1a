use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

use crate::{
    capture::{CaptureConfig, CaptureSession, CodecProbe, FfmpegProbe, MediaBlob, negotiate_mime},
    compositor::FrameCompositor,
    decode::load_slide_images,
    error::{SlidecastError, SlidecastResult},
    model::{EXPORT_FPS, ExportOptions, Slide},
    sequencer::{SequencerConfig, run_sequence},
    surface::RenderSurface,
    text::CaptionFont,
};

/// The only state shared with the UI layer: one busy flag, one progress
/// percentage, one cancellation request. Updated exclusively from inside
/// the orchestrator's run.
#[derive(Default)]
pub struct ExportState {
    exporting: AtomicBool,
    progress: AtomicU8,
    cancelled: AtomicBool,
}

impl ExportState {
    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::SeqCst)
    }

    /// Monotonically non-decreasing within a run; 0 at run start, 100 on
    /// successful completion.
    pub fn progress_percent(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Ask the in-flight run to stop. Checked between frames; the run winds
    /// down cleanly and resolves to no result.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn set_progress(&self, value: u8) {
        self.progress.fetch_max(value, Ordering::SeqCst);
    }
}

/// Public coordinator for slideshow exports. One export run may be active
/// per exporter at a time; the render surface and capture session of a run
/// are owned by that run alone.
pub struct Exporter {
    state: Arc<ExportState>,
    probe: Box<dyn CodecProbe + Send + Sync>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self::with_probe(Box::new(FfmpegProbe::new()))
    }

    /// Swap the codec probing strategy, e.g. for a different host platform.
    pub fn with_probe(probe: Box<dyn CodecProbe + Send + Sync>) -> Self {
        Self {
            state: Arc::new(ExportState::default()),
            probe,
        }
    }

    /// Shared handle for UI readers (`is_exporting`, `progress_percent`,
    /// `cancel`).
    pub fn state(&self) -> Arc<ExportState> {
        Arc::clone(&self.state)
    }

    /// Render `slides` into one encoded media blob.
    ///
    /// Expected failures (image decode, no usable codec, encoder setup or
    /// runtime errors, cancellation) resolve to `Ok(None)`: export failure
    /// is a recoverable condition the caller displays, not an exception.
    /// Calling while another run is in flight is a caller error and is
    /// rejected with `Err` instead.
    ///
    /// An empty slide list is a no-op: `Ok(None)` without touching any
    /// state.
    #[tracing::instrument(skip_all, fields(slides = slides.len()))]
    pub fn export(
        &self,
        slides: &[Slide],
        options: &ExportOptions,
    ) -> SlidecastResult<Option<MediaBlob>> {
        if slides.is_empty() {
            return Ok(None);
        }

        if self
            .state
            .exporting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SlidecastError::validation(
                "an export is already in flight on this exporter",
            ));
        }
        self.state.progress.store(0, Ordering::SeqCst);
        self.state.cancelled.store(false, Ordering::SeqCst);

        let result = self.run(slides, options);
        self.state.exporting.store(false, Ordering::SeqCst);

        match result {
            Ok(blob) => {
                self.state.set_progress(100);
                tracing::debug!(bytes = blob.bytes.len(), mime = %blob.mime, "export finished");
                Ok(Some(blob))
            }
            Err(SlidecastError::Cancelled) => {
                tracing::debug!("export cancelled");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                Ok(None)
            }
        }
    }

    fn run(&self, slides: &[Slide], options: &ExportOptions) -> SlidecastResult<MediaBlob> {
        // Decode everything up front, all-or-nothing, before any encoder
        // resources exist.
        let images = load_slide_images(slides)?;

        let preset = options.quality.preset();
        let mime = negotiate_mime(options.format, self.probe.as_ref());

        // Captions need a font; caption-less runs never touch one.
        let font = if slides.iter().any(Slide::has_caption) {
            Some(CaptionFont::load_system()?)
        } else {
            None
        };

        let mut surface = RenderSurface::new(preset.width, preset.height)?;
        let compositor =
            FrameCompositor::new(preset.width, preset.height, options.transition, font);

        // Recording starts before the first draw so the first frame is
        // captured.
        let mut session = CaptureSession::start(CaptureConfig {
            width: preset.width,
            height: preset.height,
            fps: EXPORT_FPS,
            bitrate: preset.bitrate,
            mime,
        })?;

        let cfg = SequencerConfig {
            fps: EXPORT_FPS,
            timing: options.timing,
            realtime: true,
        };
        let state = &self.state;
        run_sequence(
            &mut surface,
            &compositor,
            slides,
            &images,
            &cfg,
            &mut session,
            &state.cancelled,
            |p| state.set_progress(p),
        )?;
        // On the error path above the session drops here, which kills the
        // encoder instead of leaking it.

        session.finish()
    }
}
