use std::sync::Arc;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    error::{SlidecastError, SlidecastResult},
    model::{ImageSource, Slide},
};

/// A decoded bitmap, loaded once and reused for every frame it appears in.
/// Straight-alpha RGBA8, row-major, tightly packed.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8: Arc<Vec<u8>>,
}

impl DecodedImage {
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> SlidecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(SlidecastError::decode("image width/height must be non-zero"));
        }
        if rgba8.len() != (width as usize) * (height as usize) * 4 {
            return Err(SlidecastError::decode(
                "image buffer size mismatch with width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba8),
        })
    }

    /// Sample at continuous source coordinates with bilinear filtering.
    /// Coordinates are clamped to the image edges.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> [u8; 4] {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let u = u.clamp(0.0, max_x);
        let v = v.clamp(0.0, max_y);

        let x0 = u.floor() as u32;
        let y0 = v.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = u - x0 as f32;
        let fy = v - y0 as f32;

        let p00 = self.px(x0, y0);
        let p10 = self.px(x1, y0);
        let p01 = self.px(x0, y1);
        let p11 = self.px(x1, y1);

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p10[c]) * fx;
            let bot = f32::from(p01[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
            out[c] = (top * (1.0 - fy) + bot * fy).round() as u8;
        }
        out
    }

    fn px(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.rgba8[i],
            self.rgba8[i + 1],
            self.rgba8[i + 2],
            self.rgba8[i + 3],
        ]
    }
}

pub fn decode_image(bytes: &[u8]) -> SlidecastResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    DecodedImage::from_rgba8(width, height, rgba.into_raw())
}

pub fn load_source(source: &ImageSource) -> SlidecastResult<DecodedImage> {
    match source {
        ImageSource::Bytes(bytes) => decode_image(bytes),
        ImageSource::Path(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read image '{}'", path.display()))?;
            decode_image(&bytes)
        }
    }
}

/// Decode every slide image up front, in parallel. All-or-nothing: a single
/// failure fails the whole batch.
pub fn load_slide_images(slides: &[Slide]) -> SlidecastResult<Vec<DecodedImage>> {
    slides
        .par_iter()
        .map(|slide| load_source(&slide.source))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for px in img.pixels_mut() {
            *px = image::Rgba(rgba);
        }
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_image_png_dimensions() {
        let buf = png_bytes(3, 2, [100, 50, 200, 255]);
        let decoded = decode_image(&buf).unwrap();
        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.sample_bilinear(1.0, 0.5), [100, 50, 200, 255]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }

    #[test]
    fn bilinear_interpolates_between_texels() {
        let rgba = vec![
            0, 0, 0, 255, //
            100, 100, 100, 255,
        ];
        let img = DecodedImage::from_rgba8(2, 1, rgba).unwrap();
        assert_eq!(img.sample_bilinear(0.5, 0.0), [50, 50, 50, 255]);
        // Clamped outside the image.
        assert_eq!(img.sample_bilinear(-5.0, 0.0), [0, 0, 0, 255]);
        assert_eq!(img.sample_bilinear(5.0, 0.0), [100, 100, 100, 255]);
    }

    #[test]
    fn load_slide_images_is_all_or_nothing() {
        let ok = Slide {
            source: ImageSource::Bytes(png_bytes(1, 1, [1, 2, 3, 255])),
            caption: None,
        };
        let bad = Slide {
            source: ImageSource::Path("definitely/does/not/exist.png".into()),
            caption: None,
        };

        assert_eq!(load_slide_images(&[ok.clone()]).unwrap().len(), 1);
        assert!(load_slide_images(&[ok, bad]).is_err());
    }
}
