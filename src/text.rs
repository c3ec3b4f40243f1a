use crate::{
    error::{SlidecastError, SlidecastResult},
    surface::RenderSurface,
};

/// Greedy word wrap: words are packed onto a line until the measured width
/// of the candidate line exceeds `max_width`, then the line is flushed.
/// A single word wider than `max_width` still gets its own line.
///
/// The measurement is injected so the algorithm stays pure and testable
/// without a font.
pub fn wrap_lines<F: Fn(&str) -> f32>(text: &str, max_width: f32, measure: F) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        if measure(&candidate) > max_width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
            line = word.to_string();
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Well-known font locations, boldest first to match the heavy caption
/// weight of the product design.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// The font used for caption rendering. Loaded at most once per export run,
/// and only for runs that actually carry captions.
pub struct CaptionFont {
    font: fontdue::Font,
}

impl CaptionFont {
    pub fn from_bytes(bytes: &[u8]) -> SlidecastResult<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| SlidecastError::decode(format!("parse font: {e}")))?;
        Ok(Self { font })
    }

    /// Scan well-known system font locations and load the first parseable
    /// face. No font on the host is an environment error.
    pub fn load_system() -> SlidecastResult<Self> {
        for &path in SYSTEM_FONT_PATHS {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            match Self::from_bytes(&bytes) {
                Ok(font) => {
                    tracing::debug!(path, "caption font loaded");
                    return Ok(font);
                }
                Err(e) => tracing::debug!(path, error = %e, "font candidate rejected"),
            }
        }
        Err(SlidecastError::decode(
            "no usable system font found for caption rendering",
        ))
    }

    /// Advance width of `text` at `px` pixels.
    pub fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, px).advance_width)
            .sum()
    }

    /// Draw one line of text centered at (`center_x`, `center_y`), blended
    /// over the surface with per-glyph coverage times `alpha`.
    pub fn draw_line(
        &self,
        surface: &mut RenderSurface,
        text: &str,
        center_x: f32,
        center_y: f32,
        px: f32,
        rgb: [u8; 3],
        alpha: f32,
    ) {
        let width = self.measure(text, px);
        let mut cursor = center_x - width / 2.0;

        let baseline = match self.font.horizontal_line_metrics(px) {
            // Descent is negative; center the [baseline-ascent, baseline-descent]
            // box on center_y.
            Some(m) => center_y + (m.ascent + m.descent) / 2.0,
            None => center_y + px * 0.35,
        };

        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, px);
            let gx0 = (cursor + metrics.xmin as f32).round() as i64;
            let gy0 = baseline.round() as i64 - i64::from(metrics.ymin) - metrics.height as i64;

            for (row, chunk) in bitmap.chunks_exact(metrics.width.max(1)).enumerate() {
                for (col, &coverage) in chunk.iter().enumerate() {
                    if coverage == 0 {
                        continue;
                    }
                    let a = (f32::from(coverage) / 255.0) * alpha;
                    surface.blend_px(gx0 + col as i64, gy0 + row as i64, rgb, a);
                }
            }
            cursor += metrics.advance_width;
        }
    }
}
