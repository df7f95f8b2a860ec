pub const SUB_PIXEL_QUANTIZE: f32 = 256f32;

/// Identifies a rasterized glyph of the canvas font.
///
/// Keys are only meaningful for the font they were created with; the glyph
/// cache is cleared whenever the font changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphId {
    glyph_index: u16,
    font_size: u32, // font size * SUB_PIXEL_QUANTIZE as u32
}

impl GlyphId {
    pub fn new(glyph_index: u16, font_size: f32) -> Self {
        Self {
            glyph_index,
            font_size: (font_size * SUB_PIXEL_QUANTIZE).round() as u32,
        }
    }

    pub fn glyph_index(&self) -> u16 {
        self.glyph_index
    }

    pub fn font_size(&self) -> f32 {
        self.font_size as f32 / SUB_PIXEL_QUANTIZE
    }
}
