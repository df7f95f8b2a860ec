//! Decoding and compositing of images placed onto the canvas.

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::{DynamicImage, Rgba, RgbaImage, imageops};

use crate::error::{DecodeError, Result};

/// Prefix of an HTML `<img src="...">` PNG data URI.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// How source pixels are combined with the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositeMode {
    /// Blend using the source alpha.
    #[default]
    SourceOver,
    /// Copy the source pixels, alpha included.
    Replace,
}

/// Decodes the image carried by a `data:image/png;base64,` URI.
///
/// The prefix is matched exactly; a string without it is decoded as bare
/// base64. The image format is guessed from the decoded bytes.
pub fn decode_data_uri(data_uri: &str) -> Result<DynamicImage> {
    let payload = data_uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .unwrap_or(data_uri);
    let bytes = base64_engine
        .decode(payload.trim())
        .map_err(DecodeError::from)?;
    let image = image::load_from_memory(&bytes).map_err(DecodeError::from)?;
    Ok(image)
}

/// Resizes `image` to `width x height` with Lanczos3 resampling.
///
/// A zero `width` or `height` is derived from the other one keeping the
/// aspect ratio. When both are zero the image keeps its size.
pub fn resize(image: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (src_width, src_height) = (image.width(), image.height());
    let (width, height) = match (width, height) {
        (0, 0) => return image.to_rgba8(),
        (0, h) => (scaled(src_width, h, src_height), h),
        (w, 0) => (w, scaled(src_height, w, src_width)),
        size => size,
    };
    imageops::resize(image, width, height, imageops::FilterType::Lanczos3)
}

fn scaled(side: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 0;
    }
    ((side as f64 * target as f64 / reference as f64).round() as u32).max(1)
}

/// Places `source` with its top-left corner at `offset` on `canvas`.
///
/// Parts of `source` that fall outside the canvas are clipped.
pub fn composite(canvas: &mut RgbaImage, source: &RgbaImage, offset: (i64, i64), mode: CompositeMode) {
    let (x, y) = offset;
    let outside = x >= canvas.width() as i64
        || y >= canvas.height() as i64
        || x + source.width() as i64 <= 0
        || y + source.height() as i64 <= 0;
    if outside {
        log::warn!(
            "{}x{} image at ({x}, {y}) lies outside the {}x{} canvas",
            source.width(),
            source.height(),
            canvas.width(),
            canvas.height()
        );
        return;
    }

    match mode {
        CompositeMode::SourceOver => source_over(canvas, source, x, y),
        CompositeMode::Replace => imageops::replace(canvas, source, x, y),
    }
}

/// Blends the part of `source` that overlaps the canvas, one pixel at a time.
fn source_over(canvas: &mut RgbaImage, source: &RgbaImage, x: i64, y: i64) {
    let x_range = x.max(0)..(x + source.width() as i64).min(canvas.width() as i64);
    let y_range = y.max(0)..(y + source.height() as i64).min(canvas.height() as i64);

    for canvas_y in y_range {
        for canvas_x in x_range.clone() {
            let src = *source.get_pixel((canvas_x - x) as u32, (canvas_y - y) as u32);
            let dst = canvas.get_pixel_mut(canvas_x as u32, canvas_y as u32);
            *dst = blend_over(*dst, src, u8::MAX);
        }
    }
}

/// Source-over blend of `src` at `coverage` onto `dst`, non-premultiplied.
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>, coverage: u8) -> Rgba<u8> {
    let src_a = src[3] as f32 / 255.0 * coverage as f32 / 255.0;
    if src_a <= 0.0 {
        return dst;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let v = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        out[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
