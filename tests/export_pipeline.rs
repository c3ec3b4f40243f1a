//! Full export runs through the real encoder. Skipped when ffmpeg is not
//! available on PATH.

use std::io::Cursor;

use slidecast::{
    ExportOptions, FormatHint, ImageSource, Quality, Slide, TimingPreset, TransitionStyle,
    mime_candidates,
};

fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
    let mut img = image::RgbaImage::new(32, 32);
    for px in img.pixels_mut() {
        *px = image::Rgba([rgb[0], rgb[1], rgb[2], 255]);
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn slide(rgb: [u8; 3], caption: Option<&str>) -> Slide {
    Slide {
        source: ImageSource::Bytes(png_bytes(rgb)),
        caption: caption.map(str::to_string),
    }
}

/// The local ffmpeg must exist and carry at least one encoder of the hinted
/// family, otherwise the scenario cannot produce a blob and is skipped.
fn encoder_available(hint: FormatHint) -> bool {
    use slidecast::CodecProbe as _;
    if !slidecast::is_ffmpeg_on_path() {
        return false;
    }
    let probe = slidecast::FfmpegProbe::new();
    mime_candidates(hint).iter().any(|m| probe.supports(m))
}

#[test]
fn single_slide_exports_to_a_tagged_blob() {
    if !encoder_available(FormatHint::Auto) {
        eprintln!("skipping: no usable ffmpeg encoder");
        return;
    }

    // Captions only when a system font exists, so the test does not depend
    // on the host's font inventory.
    let caption = slidecast::CaptionFont::load_system().ok().map(|_| "Hello");

    let exporter = slidecast::Exporter::new();
    let options = ExportOptions {
        quality: Quality::Q720p,
        format: FormatHint::Auto,
        transition: TransitionStyle::Fade,
        timing: TimingPreset::Classic,
    };

    let blob = exporter
        .export(&[slide([180, 60, 40], caption)], &options)
        .unwrap()
        .expect("export should produce a blob");

    assert!(!blob.bytes.is_empty());
    assert!(
        mime_candidates(FormatHint::Auto).contains(&blob.mime.as_str()),
        "unexpected mime {}",
        blob.mime
    );
    assert_eq!(exporter.state().progress_percent(), 100);
    assert!(!exporter.state().is_exporting());
}

#[test]
fn multi_slide_export_reports_full_progress() {
    if !encoder_available(FormatHint::Webm) {
        eprintln!("skipping: no usable ffmpeg webm encoder");
        return;
    }

    let exporter = slidecast::Exporter::new();
    let state = exporter.state();
    let options = ExportOptions {
        quality: Quality::Q720p,
        format: FormatHint::Webm,
        transition: TransitionStyle::Slide,
        timing: TimingPreset::Classic,
    };

    assert_eq!(state.progress_percent(), 0);
    let blob = exporter
        .export(
            &[slide([200, 20, 20], None), slide([20, 200, 20], None)],
            &options,
        )
        .unwrap()
        .expect("export should produce a blob");

    assert!(blob.mime.starts_with("video/webm"));
    assert_eq!(blob.extension(), "webm");
    assert_eq!(state.progress_percent(), 100);
    assert!(!state.is_exporting());
}

#[test]
fn cancelled_export_resolves_to_none_and_recovers() {
    if !encoder_available(FormatHint::Webm) {
        eprintln!("skipping: no usable ffmpeg webm encoder");
        return;
    }

    let exporter = std::sync::Arc::new(slidecast::Exporter::new());
    let state = exporter.state();
    let options = ExportOptions {
        quality: Quality::Q720p,
        format: FormatHint::Webm,
        transition: TransitionStyle::Zoom,
        timing: TimingPreset::Classic,
    };

    let worker = {
        let exporter = std::sync::Arc::clone(&exporter);
        std::thread::spawn(move || {
            exporter.export(&[slide([90, 90, 200], None), slide([200, 90, 90], None)], &options)
        })
    };

    // Let the run get past setup, then pull the plug mid-sequence.
    while !state.is_exporting() {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    std::thread::sleep(std::time::Duration::from_millis(500));
    state.cancel();

    let result = worker.join().unwrap().unwrap();
    assert!(result.is_none());
    assert!(!state.is_exporting());
}
