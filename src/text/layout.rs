use crate::glyph_id::GlyphId;

/// Where and how the lines of a draw call are placed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextLayoutConfig {
    /// Left edge of every line.
    pub origin_x: f32,
    /// Baseline of the first line.
    pub first_baseline: f32,
    /// Distance between two consecutive baselines.
    pub line_advance: f32,
    pub font_size: f32,
}

/// Glyph positions of all lines of a draw call.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<TextLayoutLine>,
}

/// A single line of positioned glyphs.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayoutLine {
    pub baseline: f32,
    /// Pen position after the last glyph.
    pub line_width: f32,
    pub glyphs: Vec<GlyphPosition>,
}

/// **Y-axis goes down**
///
/// `x` and `y` are the top-left corner of the glyph bitmap in canvas
/// coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphPosition {
    pub glyph_id: GlyphId,
    pub x: f32,
    pub y: f32,
}

impl TextLayout {
    /// Lays out each string as one line, left aligned at `config.origin_x`.
    ///
    /// The pen advances by the glyph advance width plus the kerning between
    /// the previous and the current glyph. Sizes that are not strictly
    /// positive produce lines without glyphs.
    pub fn new<S: AsRef<str>>(font: &fontdue::Font, config: &TextLayoutConfig, lines: &[S]) -> Self {
        let font_size = config.font_size;
        let renderable = font_size.is_finite() && font_size > 0.0;
        if !renderable {
            log::warn!("font size {font_size} is not positive, text will not be visible");
        }

        let lines = lines
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let baseline = config.first_baseline + config.line_advance * i as f32;
                if renderable {
                    layout_line(font, font_size, config.origin_x, baseline, text.as_ref())
                } else {
                    TextLayoutLine {
                        baseline,
                        line_width: 0.0,
                        glyphs: Vec::new(),
                    }
                }
            })
            .collect();

        Self { lines }
    }

    pub fn glyph_count(&self) -> usize {
        self.lines.iter().map(|line| line.glyphs.len()).sum()
    }
}

fn layout_line(
    font: &fontdue::Font,
    font_size: f32,
    origin_x: f32,
    baseline: f32,
    text: &str,
) -> TextLayoutLine {
    let mut pen_x = origin_x;
    let mut glyphs = Vec::with_capacity(text.len());
    let mut last_glyph: Option<u16> = None;

    for ch in text.chars() {
        let glyph_index = font.lookup_glyph_index(ch);

        if let Some(last) = last_glyph {
            pen_x += font
                .horizontal_kern_indexed(last, glyph_index, font_size)
                .unwrap_or(0.0);
        }

        let metrics = font.metrics_indexed(glyph_index, font_size);
        if metrics.width != 0 && metrics.height != 0 {
            glyphs.push(GlyphPosition {
                glyph_id: GlyphId::new(glyph_index, font_size),
                x: pen_x + metrics.xmin as f32,
                y: baseline - (metrics.ymin as f32 + metrics.height as f32),
            });
        }

        pen_x += metrics.advance_width;
        last_glyph = Some(glyph_index);
    }

    TextLayoutLine {
        baseline,
        line_width: pen_x - origin_x,
        glyphs,
    }
}
