use image::{Rgba, RgbaImage};

use crate::composite::blend_over;
use crate::renderer::glyph_cache::GlyphCache;
use crate::text::{GlyphPosition, TextLayout};

/// CPU renderer that paints glyph coverage onto an RGBA canvas.
pub struct CpuRenderer {
    cache: GlyphCache,
}

impl CpuRenderer {
    /// Creates a renderer from the provided cache.
    pub fn new(cache: GlyphCache) -> Self {
        Self { cache }
    }

    /// Paints every glyph of `layout` in `color`, blending source-over.
    ///
    /// Glyph coverage scales the color alpha. Pixels outside the canvas are
    /// clipped.
    pub fn render_layout(
        &mut self,
        layout: &TextLayout,
        canvas: &mut RgbaImage,
        color: Rgba<u8>,
        font: &fontdue::Font,
    ) {
        if canvas.width() == 0 || canvas.height() == 0 || color[3] == 0 {
            return;
        }

        for line in &layout.lines {
            for glyph in &line.glyphs {
                self.render_glyph(canvas, glyph, color, font);
            }
        }
    }

    fn render_glyph(
        &mut self,
        canvas: &mut RgbaImage,
        glyph_pos: &GlyphPosition,
        color: Rgba<u8>,
        font: &fontdue::Font,
    ) {
        let Some(cached) = self.cache.get(glyph_pos.glyph_id, font) else {
            return;
        };

        let glyph_width = cached.metrics.width;
        let glyph_height = cached.metrics.height;
        let origin_x = glyph_pos.x.round() as i64;
        let origin_y = glyph_pos.y.round() as i64;
        let (canvas_width, canvas_height) = (canvas.width() as i64, canvas.height() as i64);

        for row in 0..glyph_height {
            let y = origin_y + row as i64;
            if y < 0 || y >= canvas_height {
                continue;
            }

            for col in 0..glyph_width {
                let coverage = cached.data[row * glyph_width + col];
                if coverage == 0 {
                    continue;
                }

                let x = origin_x + col as i64;
                if x < 0 || x >= canvas_width {
                    continue;
                }

                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                *pixel = blend_over(*pixel, color, coverage);
            }
        }
    }

    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut GlyphCache {
        &mut self.cache
    }
}
