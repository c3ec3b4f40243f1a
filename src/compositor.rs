use crate::{
    decode::DecodedImage,
    model::TransitionStyle,
    surface::RenderSurface,
    text::{CaptionFont, wrap_lines},
};

/// Backdrop gradient endpoints, dark navy to slightly lighter slate. Fixed
/// by design, not user-configurable.
pub const BACKGROUND_TOP: [u8; 3] = [0x0a, 0x0f, 0x1c];
pub const BACKGROUND_BOTTOM: [u8; 3] = [0x15, 0x1a, 0x28];

const CAPTION_BACKDROP_ALPHA: f32 = 0.45;
const CAPTION_TEXT_ALPHA: f32 = 0.96;
const CAPTION_CORNER_RADIUS: f32 = 14.0;

/// Caption geometry for a canvas and a wrapped line count. Padding, font
/// size and line height all scale with the canvas width so captions stay
/// equally legible across quality presets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptionLayout {
    pub pad: f32,
    pub max_width: f32,
    pub font_px: f32,
    pub line_height: f32,
    pub box_h: f32,
    pub box_center_y: f32,
}

impl CaptionLayout {
    pub fn for_canvas(width: u32, height: u32, line_count: usize) -> Self {
        let w = width as f32;
        let h = height as f32;
        let pad = (w * 0.06).round();
        let line_height = (w * 0.045).round();
        let box_h = line_count as f32 * line_height + (line_height * 0.8).round();
        Self {
            pad,
            max_width: w - pad * 2.0,
            font_px: (w * 0.035).round(),
            line_height,
            box_h,
            // Bottom edge of the backdrop sits at 84% of the frame height.
            box_center_y: h - (h * 0.16).round() - box_h / 2.0,
        }
    }

    /// Center of the first text line; subsequent lines step by
    /// `line_height`.
    pub fn first_line_y(&self, line_count: usize) -> f32 {
        self.box_center_y - ((line_count - 1) as f32 * self.line_height) / 2.0
    }
}

/// Pure, synchronous frame drawing for one export run: background, cover-fit
/// image placement, caption layout, and transition blending.
///
/// The compositor holds no pixels itself; every call writes into the run's
/// [`RenderSurface`]. The font is `None` only for runs without captions.
pub struct FrameCompositor {
    width: u32,
    height: u32,
    transition: TransitionStyle,
    font: Option<CaptionFont>,
}

impl FrameCompositor {
    pub fn new(
        width: u32,
        height: u32,
        transition: TransitionStyle,
        font: Option<CaptionFont>,
    ) -> Self {
        Self {
            width,
            height,
            transition,
            font,
        }
    }

    /// Erase the previous frame with the fixed vertical gradient. Always the
    /// first call of every frame; the surface persists between draws.
    pub fn draw_background(&self, surface: &mut RenderSurface) {
        surface.fill_vertical_gradient(BACKGROUND_TOP, BACKGROUND_BOTTOM);
    }

    /// Cover-fit placement: scale by `max(cw/iw, ch/ih) * scale`, center,
    /// shift by (dx, dy). At `dx = dy = 0` and `scale >= 1` the canvas is
    /// fully covered for any source aspect ratio; overflow crops evenly.
    pub fn draw_image_cover(
        &self,
        surface: &mut RenderSurface,
        img: &DecodedImage,
        dx: f32,
        dy: f32,
        scale: f32,
        opacity: f32,
    ) {
        if opacity <= 0.0 {
            return;
        }
        let cw = self.width as f32;
        let ch = self.height as f32;
        let iw = img.width as f32;
        let ih = img.height as f32;

        let s = (cw / iw).max(ch / ih) * scale;
        let w = iw * s;
        let h = ih * s;
        let x0 = (cw - w) / 2.0 + dx;
        let y0 = (ch - h) / 2.0 + dy;

        let px0 = x0.floor().max(0.0) as i64;
        let py0 = y0.floor().max(0.0) as i64;
        let px1 = ((x0 + w).ceil() as i64).min(i64::from(self.width));
        let py1 = ((y0 + h).ceil() as i64).min(i64::from(self.height));

        for py in py0..py1 {
            let v = (py as f32 + 0.5 - y0) / s - 0.5;
            for px in px0..px1 {
                let u = (px as f32 + 0.5 - x0) / s - 0.5;
                let sample = img.sample_bilinear(u, v);
                let a = (f32::from(sample[3]) / 255.0) * opacity;
                surface.blend_px(px, py, [sample[0], sample[1], sample[2]], a);
            }
        }
    }

    /// Word-wrapped caption over a semi-transparent rounded backdrop,
    /// anchored near the bottom of the frame. No-op for blank captions or
    /// when the run carries no font.
    pub fn draw_caption(&self, surface: &mut RenderSurface, caption: Option<&str>) {
        let Some(text) = caption.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let Some(font) = &self.font else {
            return;
        };

        let probe = CaptionLayout::for_canvas(self.width, self.height, 1);
        let lines = wrap_lines(text, probe.max_width, |s| font.measure(s, probe.font_px));
        if lines.is_empty() {
            return;
        }

        let layout = CaptionLayout::for_canvas(self.width, self.height, lines.len());
        surface.fill_rounded_rect(
            layout.pad,
            layout.box_center_y - layout.box_h / 2.0,
            layout.max_width,
            layout.box_h,
            CAPTION_CORNER_RADIUS,
            [0, 0, 0],
            CAPTION_BACKDROP_ALPHA,
        );

        let start_y = layout.first_line_y(lines.len());
        for (i, line) in lines.iter().enumerate() {
            font.draw_line(
                surface,
                line,
                self.width as f32 / 2.0,
                start_y + i as f32 * layout.line_height,
                layout.font_px,
                [255, 255, 255],
                CAPTION_TEXT_ALPHA,
            );
        }
    }

    pub fn draw_still_frame(
        &self,
        surface: &mut RenderSurface,
        img: &DecodedImage,
        caption: Option<&str>,
    ) {
        self.draw_background(surface);
        self.draw_image_cover(surface, img, 0.0, 0.0, 1.0, 1.0);
        self.draw_caption(surface, caption);
    }

    /// One blended frame between `current` and `next` at `t` in [0, 1].
    /// `t = 0` reproduces the still frame of `current` and `t = 1` the still
    /// frame of `next`, for every transition style. The caption shown is the
    /// active slide's, drawn last and undistorted.
    pub fn draw_transition_frame(
        &self,
        surface: &mut RenderSurface,
        current: &DecodedImage,
        next: &DecodedImage,
        t: f32,
        caption: Option<&str>,
    ) {
        let t = t.clamp(0.0, 1.0);
        self.draw_background(surface);

        match self.transition {
            TransitionStyle::Fade => {
                self.draw_image_cover(surface, current, 0.0, 0.0, 1.0, 1.0 - t);
                self.draw_image_cover(surface, next, 0.0, 0.0, 1.0, t);
            }
            TransitionStyle::Slide => {
                let dx = (self.width as f32 * 0.18).round();
                if t < 1.0 {
                    self.draw_image_cover(surface, current, -dx * t, 0.0, 1.0, 1.0);
                }
                if t > 0.0 {
                    self.draw_image_cover(surface, next, dx * (1.0 - t), 0.0, 1.0, 1.0);
                }
            }
            TransitionStyle::Zoom => {
                // Cross-zoom: the outgoing image drifts outward from scale 1,
                // the incoming image settles down to scale 1 as it fades in,
                // so both endpoints match the neighboring still frames.
                self.draw_image_cover(surface, current, 0.0, 0.0, 1.0 + 0.04 * t, 1.0);
                self.draw_image_cover(surface, next, 0.0, 0.0, 1.0 + 0.04 * (1.0 - t), t);
            }
        }

        self.draw_caption(surface, caption);
    }
}
