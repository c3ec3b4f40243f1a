use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use crate::{
    compositor::FrameCompositor,
    decode::DecodedImage,
    error::{SlidecastError, SlidecastResult},
    model::{Slide, TimingPreset},
    surface::RenderSurface,
};

/// Consumes frames off the render surface in draw order. The capture
/// session implements this; tests substitute counters.
pub trait FrameSink {
    fn capture(&mut self, surface: &RenderSurface) -> SlidecastResult<()>;
}

#[derive(Clone, Copy, Debug)]
pub struct SequencerConfig {
    pub fps: u32,
    pub timing: TimingPreset,
    /// Pace draws against the wall clock. Always on for real exports; tests
    /// turn it off to run the full schedule instantly.
    pub realtime: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            fps: crate::model::EXPORT_FPS,
            timing: TimingPreset::default(),
            realtime: true,
        }
    }
}

/// Per-slide frame budget. Transition frames are carved out of the slide's
/// budget, not added on top: still frames + transition frames sum to
/// `frames_per_slide` exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlideSchedule {
    pub frames_per_slide: u32,
    pub transition_frames: u32,
}

impl SlideSchedule {
    pub fn still_frames(self) -> u32 {
        self.frames_per_slide - self.transition_frames
    }
}

impl SequencerConfig {
    pub fn schedule(&self) -> SlidecastResult<SlideSchedule> {
        if self.fps == 0 {
            return Err(SlidecastError::validation("sequencer fps must be non-zero"));
        }
        let frames_per_slide =
            ((self.timing.still_ms() as f64 / 1000.0) * f64::from(self.fps)).round() as u32;
        let transition_frames =
            ((self.timing.transition_ms() as f64 / 1000.0) * f64::from(self.fps)).round() as u32;
        if transition_frames > frames_per_slide {
            return Err(SlidecastError::validation(
                "transition cannot be longer than the slide itself",
            ));
        }
        Ok(SlideSchedule {
            frames_per_slide,
            transition_frames,
        })
    }
}

/// Blend parameter for transition frame `frame` of `total`: spans [0, 1]
/// inclusive across the transition window.
pub fn transition_progress(frame: u32, total: u32) -> f32 {
    frame as f32 / total.saturating_sub(1).max(1) as f32
}

/// Drift-free frame pacing: each wait targets the next multiple of the
/// frame interval from the loop start, so a slow draw eats into the
/// following wait instead of stretching the whole run.
struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    fn new(fps: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            // Behind schedule: re-anchor rather than sleeping zero forever.
            self.next = now + self.interval;
        }
    }
}

/// Drive the compositor through every slide in order: the still portion,
/// then the blend into the wrapping next slide. Each drawn frame is pushed
/// to the sink before the pacing wait, so the sink always samples the
/// post-draw state.
///
/// Progress is reported after each finished slide as
/// `round(((i + 1) / n) * 90)`; the final 10% belongs to encode
/// finalization, which happens after this returns.
pub fn run_sequence(
    surface: &mut RenderSurface,
    compositor: &FrameCompositor,
    slides: &[Slide],
    images: &[DecodedImage],
    cfg: &SequencerConfig,
    sink: &mut dyn FrameSink,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(u8),
) -> SlidecastResult<()> {
    if slides.is_empty() || slides.len() != images.len() {
        return Err(SlidecastError::validation(
            "sequencer needs one decoded image per slide",
        ));
    }

    let schedule = cfg.schedule()?;
    let n = slides.len();
    let mut pacer = cfg.realtime.then(|| FramePacer::new(cfg.fps));
    tracing::debug!(
        slides = n,
        frames_per_slide = schedule.frames_per_slide,
        transition_frames = schedule.transition_frames,
        fps = cfg.fps,
        "sequencing start"
    );

    for i in 0..n {
        let current = &images[i];
        let next = &images[(i + 1) % n];
        let caption = slides[i].caption.as_deref();

        for _ in 0..schedule.still_frames() {
            if cancel.load(Ordering::Relaxed) {
                return Err(SlidecastError::Cancelled);
            }
            compositor.draw_still_frame(surface, current, caption);
            sink.capture(surface)?;
            if let Some(p) = pacer.as_mut() {
                p.wait();
            }
        }

        for tf in 0..schedule.transition_frames {
            if cancel.load(Ordering::Relaxed) {
                return Err(SlidecastError::Cancelled);
            }
            let t = transition_progress(tf, schedule.transition_frames);
            compositor.draw_transition_frame(surface, current, next, t, caption);
            sink.capture(surface)?;
            if let Some(p) = pacer.as_mut() {
                p.wait();
            }
        }

        let progress = (((i + 1) as f64 / n as f64) * 90.0).round() as u8;
        on_progress(progress);
    }

    Ok(())
}
