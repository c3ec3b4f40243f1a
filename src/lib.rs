#![forbid(unsafe_code)]

pub mod capture;
pub mod compositor;
pub mod decode;
pub mod error;
pub mod export;
pub mod model;
pub mod sequencer;
pub mod surface;
pub mod text;

pub use capture::{
    CaptureConfig, CaptureSession, CodecProbe, FfmpegProbe, MediaBlob, is_ffmpeg_on_path,
    mime_candidates, negotiate_mime,
};
pub use compositor::{CaptionLayout, FrameCompositor};
pub use decode::{DecodedImage, decode_image, load_slide_images};
pub use error::{SlidecastError, SlidecastResult};
pub use export::{ExportState, Exporter};
pub use model::{
    EXPORT_FPS, ExportOptions, FormatHint, ImageSource, Quality, QualityPreset, Slide,
    TimingPreset, TransitionStyle,
};
pub use sequencer::{FrameSink, SequencerConfig, SlideSchedule, run_sequence};
pub use surface::RenderSurface;
pub use text::{CaptionFont, wrap_lines};
