use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "slidecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a slideshow video from a manifest (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input manifest JSON: an array of `{ "image": path, "caption"?: text }`.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output resolution tier.
    #[arg(long, value_enum, default_value_t = QualityChoice::Q1080p)]
    quality: QualityChoice,

    /// Container/codec preference.
    #[arg(long, value_enum, default_value_t = FormatChoice::Auto)]
    format: FormatChoice,

    /// Transition style between slides.
    #[arg(long, value_enum, default_value_t = TransitionChoice::Fade)]
    transition: TransitionChoice,

    /// Slide/transition timing preset.
    #[arg(long, value_enum, default_value_t = TimingChoice::Classic)]
    timing: TimingChoice,

    /// Title used to derive the output file name.
    #[arg(long, default_value = "slideshow")]
    title: String,

    /// Directory the video is written into; the extension follows the
    /// negotiated container.
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide index (0-based).
    #[arg(long, default_value_t = 0)]
    slide: usize,

    /// When set, render the transition frame into the next slide at this
    /// blend position in [0, 1] instead of the still frame.
    #[arg(long)]
    t: Option<f32>,

    /// Output resolution tier.
    #[arg(long, value_enum, default_value_t = QualityChoice::Q1080p)]
    quality: QualityChoice,

    /// Transition style (only used together with --t).
    #[arg(long, value_enum, default_value_t = TransitionChoice::Fade)]
    transition: TransitionChoice,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    #[value(name = "720p")]
    Q720p,
    #[value(name = "1080p")]
    Q1080p,
    #[value(name = "4k")]
    Q4k,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Auto,
    Webm,
    Mp4,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransitionChoice {
    Fade,
    Slide,
    Zoom,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimingChoice {
    Classic,
    Relaxed,
}

impl From<QualityChoice> for slidecast::Quality {
    fn from(value: QualityChoice) -> Self {
        match value {
            QualityChoice::Q720p => slidecast::Quality::Q720p,
            QualityChoice::Q1080p => slidecast::Quality::Q1080p,
            QualityChoice::Q4k => slidecast::Quality::Q4k,
        }
    }
}

impl From<FormatChoice> for slidecast::FormatHint {
    fn from(value: FormatChoice) -> Self {
        match value {
            FormatChoice::Auto => slidecast::FormatHint::Auto,
            FormatChoice::Webm => slidecast::FormatHint::Webm,
            FormatChoice::Mp4 => slidecast::FormatHint::Mp4,
        }
    }
}

impl From<TransitionChoice> for slidecast::TransitionStyle {
    fn from(value: TransitionChoice) -> Self {
        match value {
            TransitionChoice::Fade => slidecast::TransitionStyle::Fade,
            TransitionChoice::Slide => slidecast::TransitionStyle::Slide,
            TransitionChoice::Zoom => slidecast::TransitionStyle::Zoom,
        }
    }
}

impl From<TimingChoice> for slidecast::TimingPreset {
    fn from(value: TimingChoice) -> Self {
        match value {
            TimingChoice::Classic => slidecast::TimingPreset::Classic,
            TimingChoice::Relaxed => slidecast::TimingPreset::Relaxed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<Vec<slidecast::Slide>> {
    let f = File::open(path).with_context(|| format!("open manifest '{}'", path.display()))?;
    let r = BufReader::new(f);
    let slides: Vec<slidecast::Slide> =
        serde_json::from_reader(r).with_context(|| "parse manifest JSON")?;
    Ok(slides)
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let slides = resolve_slides(read_manifest(&args.in_path)?, &args.in_path);
    anyhow::ensure!(!slides.is_empty(), "manifest contains no slides");

    let options = slidecast::ExportOptions {
        quality: args.quality.into(),
        format: args.format.into(),
        transition: args.transition.into(),
        timing: args.timing.into(),
    };

    let exporter = slidecast::Exporter::new();
    let blob = exporter
        .export(&slides, &options)?
        .ok_or_else(|| anyhow::anyhow!("export failed, try again"))?;

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("create output dir '{}'", args.dir.display()))?;
    let out = args
        .dir
        .join(format!("{}.{}", args.title.trim(), blob.extension()));
    std::fs::write(&out, &blob.bytes)
        .with_context(|| format!("write video '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let slides = resolve_slides(read_manifest(&args.in_path)?, &args.in_path);
    anyhow::ensure!(!slides.is_empty(), "manifest contains no slides");
    anyhow::ensure!(
        args.slide < slides.len(),
        "slide index {} out of range ({} slides)",
        args.slide,
        slides.len()
    );

    let images = slidecast::load_slide_images(&slides)?;
    let preset = slidecast::Quality::from(args.quality).preset();

    let font = if slides.iter().any(slidecast::Slide::has_caption) {
        Some(slidecast::CaptionFont::load_system()?)
    } else {
        None
    };
    let compositor = slidecast::FrameCompositor::new(
        preset.width,
        preset.height,
        args.transition.into(),
        font,
    );
    let mut surface = slidecast::RenderSurface::new(preset.width, preset.height)?;

    let caption = slides[args.slide].caption.as_deref();
    match args.t {
        Some(t) => {
            let next = &images[(args.slide + 1) % images.len()];
            compositor.draw_transition_frame(&mut surface, &images[args.slide], next, t, caption);
        }
        None => compositor.draw_still_frame(&mut surface, &images[args.slide], caption),
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        surface.data(),
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Manifest image paths are resolved relative to the manifest file itself.
fn resolve_slides(slides: Vec<slidecast::Slide>, manifest_path: &Path) -> Vec<slidecast::Slide> {
    let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    slides
        .into_iter()
        .map(|slide| {
            let source = match slide.source {
                slidecast::ImageSource::Path(p) if p.is_relative() => {
                    slidecast::ImageSource::Path(root.join(p))
                }
                s => s,
            };
            slidecast::Slide {
                source,
                caption: slide.caption,
            }
        })
        .collect()
}
