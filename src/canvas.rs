use std::{num::NonZeroUsize, path::Path, sync::Arc};

use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage, codecs::png::PngEncoder};

use crate::{
    composite::{self, CompositeMode},
    error::{Error, Result},
    font_storage::{self, FontStorage},
    renderer::{CpuRenderer, GlyphCache},
    text::{TextLayout, TextLayoutConfig},
};

pub const DEFAULT_WIDTH: u32 = 320;
pub const DEFAULT_HEIGHT: u32 = 240;
pub const DEFAULT_FONT_SIZE: f32 = 14.0;
/// Baseline distance in multiples of the font size.
pub const DEFAULT_LINE_SPACING: f32 = 3.0;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Construction parameters of a [`TextCanvas`].
#[derive(Clone, Debug, PartialEq)]
pub struct TextCanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub font_size: f32,
    pub line_spacing: f32,
    /// `(block size in coverage bytes, slot count)` per glyph cache bucket.
    pub glyph_cache: Vec<(NonZeroUsize, NonZeroUsize)>,
}

impl Default for TextCanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            background: TRANSPARENT,
            font_size: DEFAULT_FONT_SIZE,
            line_spacing: DEFAULT_LINE_SPACING,
            glyph_cache: default_glyph_cache(),
        }
    }
}

fn default_glyph_cache() -> Vec<(NonZeroUsize, NonZeroUsize)> {
    [(1024, 512), (4096, 128), (16384, 32)]
        .into_iter()
        .filter_map(|(block, slots)| Some((NonZeroUsize::new(block)?, NonZeroUsize::new(slots)?)))
        .collect()
}

/// A raster canvas that text and images are drawn onto.
///
/// The canvas keeps its size for its whole lifetime. Text drawing always
/// starts from a canvas filled with the background color; image composites
/// are layered onto whatever the canvas currently holds.
pub struct TextCanvas {
    canvas: RgbaImage,
    background: Rgba<u8>,
    font: Option<Arc<fontdue::Font>>,
    font_size: f32,
    line_spacing: f32,
    renderer: CpuRenderer,
    font_storage: Option<FontStorage>,
}

impl Default for TextCanvas {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl TextCanvas {
    /// Wraps `canvas`, or a blank 320x240 one, with `background` (transparent
    /// when absent).
    pub fn new(canvas: Option<RgbaImage>, background: Option<Rgba<u8>>) -> Self {
        let config = TextCanvasConfig::default();
        let canvas = canvas.unwrap_or_else(|| RgbaImage::new(config.width, config.height));
        Self {
            canvas,
            background: background.unwrap_or(TRANSPARENT),
            font: None,
            font_size: config.font_size,
            line_spacing: config.line_spacing,
            renderer: CpuRenderer::new(GlyphCache::new(&config.glyph_cache)),
            font_storage: None,
        }
    }

    /// Creates a blank canvas from `config`.
    pub fn with_config(config: TextCanvasConfig) -> Self {
        Self {
            canvas: RgbaImage::new(config.width, config.height),
            background: config.background,
            font: None,
            font_size: config.font_size,
            line_spacing: config.line_spacing,
            renderer: CpuRenderer::new(GlyphCache::new(&config.glyph_cache)),
            font_storage: None,
        }
    }
}

/// font
impl TextCanvas {
    /// Sets the font used by text drawing.
    ///
    /// Fails with [`Error::InvalidFont`] when `font` is `None` or has no glyphs.
    pub fn set_font(&mut self, font: impl Into<Option<Arc<fontdue::Font>>>) -> Result<()> {
        let font = font.into().ok_or(Error::InvalidFont)?;
        if font.glyph_count() == 0 {
            return Err(Error::InvalidFont);
        }

        log::debug!("font set ({} glyphs)", font.glyph_count());
        self.font = Some(font);
        self.renderer.cache_mut().clear();
        Ok(())
    }

    /// Reads and parses the font file at `path`, then sets it.
    pub fn set_font_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let font = font_storage::load_font_file(path)?;
        self.set_font(Arc::new(font))
    }

    /// Parses `data` as a font and sets it. `collection_index` picks the
    /// face inside a font collection.
    pub fn set_font_from_bytes(&mut self, data: &[u8], collection_index: u32) -> Result<()> {
        let font = font_storage::parse_font(data, collection_index)?;
        self.set_font(Arc::new(font))
    }

    /// Font database used by [`Self::set_font_from_storage`], created empty on
    /// first access.
    ///
    /// Register extra fonts here, or point the generic families at installed
    /// ones (`fontdb` maps `SansSerif` to "Arial" by default).
    pub fn font_storage_mut(&mut self) -> &mut FontStorage {
        self.font_storage.get_or_insert_with(FontStorage::new)
    }

    /// Sets the font of the canvas storage that best matches `families`.
    ///
    /// Fails with [`Error::InvalidFont`] when no registered face matches.
    pub fn set_font_from_storage(&mut self, families: &[fontdb::Family<'_>]) -> Result<()> {
        let font = self
            .font_storage_mut()
            .query(families)
            .ok_or(Error::InvalidFont)?;
        self.set_font(font)
    }

    /// Loads the system fonts into the canvas storage, then behaves like
    /// [`Self::set_font_from_storage`].
    pub fn set_font_from_system(&mut self, families: &[fontdb::Family<'_>]) -> Result<()> {
        self.font_storage_mut().load_system_fonts();
        self.set_font_from_storage(families)
    }

    /// Stores the font size in points. `0.0` selects the default of 14.
    ///
    /// Other values are kept as given; non-positive sizes draw nothing.
    pub fn set_font_size(&mut self, size: f32) {
        self.font_size = if size == 0.0 { DEFAULT_FONT_SIZE } else { size };
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn font(&self) -> Option<&Arc<fontdue::Font>> {
        self.font.as_ref()
    }

    pub fn clear_glyph_cache(&mut self) {
        self.renderer.cache_mut().clear();
    }
}

/// text
impl TextCanvas {
    /// Fills the canvas with the background and draws `lines` top to bottom.
    ///
    /// Every line starts at x = 0. The first baseline sits at the font size
    /// and each following one `font_size * line_spacing` lower. `foreground`
    /// defaults to black.
    pub fn draw_text<S: AsRef<str>>(
        &mut self,
        foreground: Option<Rgba<u8>>,
        lines: &[S],
    ) -> Result<&RgbaImage> {
        let font = self.font.clone().ok_or(Error::InvalidFont)?;

        self.clear();
        let config = TextLayoutConfig {
            origin_x: 0.0,
            first_baseline: self.font_size,
            line_advance: self.font_size * self.line_spacing,
            font_size: self.font_size,
        };
        self.render(&font, &config, foreground, lines);

        Ok(&self.canvas)
    }

    /// Draws a single line over the current content, its top at
    /// `offset.1` and its left edge at `offset.0`.
    ///
    /// Unlike [`Self::draw_text`] the background is not filled.
    pub fn add_text_line(
        &mut self,
        offset: (i64, i64),
        text: &str,
        foreground: Option<Rgba<u8>>,
    ) -> Result<&RgbaImage> {
        let font = self.font.clone().ok_or(Error::InvalidFont)?;

        let config = TextLayoutConfig {
            origin_x: offset.0 as f32,
            first_baseline: offset.1 as f32 + self.font_size,
            line_advance: 0.0,
            font_size: self.font_size,
        };
        self.render(&font, &config, foreground, &[text]);

        Ok(&self.canvas)
    }

    fn render<S: AsRef<str>>(
        &mut self,
        font: &fontdue::Font,
        config: &TextLayoutConfig,
        foreground: Option<Rgba<u8>>,
        lines: &[S],
    ) {
        let layout = TextLayout::new(font, config, lines);
        self.renderer.render_layout(
            &layout,
            &mut self.canvas,
            foreground.unwrap_or(BLACK),
            font,
        );
    }

    /// Fills the whole canvas with the background color.
    pub fn clear(&mut self) {
        let background = self.background;
        self.canvas.pixels_mut().for_each(|p| *p = background);
    }
}

/// png export
impl TextCanvas {
    /// Draws `lines` like [`Self::draw_text`] and returns the canvas as PNG.
    pub fn to_png<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        foreground: Option<Rgba<u8>>,
    ) -> Result<Vec<u8>> {
        self.draw_text(foreground, lines)?;
        self.png()
    }

    /// Encodes the current canvas as PNG.
    pub fn png(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer)
            .write_image(
                self.canvas.as_raw(),
                self.canvas.width(),
                self.canvas.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(Error::Serialization)?;
        Ok(buffer)
    }
}

/// image composites
impl TextCanvas {
    /// Blends `source` onto the canvas with its top-left corner at `offset`.
    pub fn composite_image(&mut self, offset: (i64, i64), source: &RgbaImage) -> &RgbaImage {
        self.composite_with(offset, source, CompositeMode::SourceOver)
    }

    /// Places `source` at `offset` using `mode`.
    pub fn composite_with(
        &mut self,
        offset: (i64, i64),
        source: &RgbaImage,
        mode: CompositeMode,
    ) -> &RgbaImage {
        log::debug!(
            "compositing {}x{} image at {offset:?} ({mode:?})",
            source.width(),
            source.height()
        );
        composite::composite(&mut self.canvas, source, offset, mode);
        &self.canvas
    }

    /// Decodes a `data:image/png;base64,` URI and copies the image onto the
    /// canvas at `offset`, replacing the covered pixels.
    pub fn composite_from_data_uri(
        &mut self,
        offset: (i64, i64),
        data_uri: &str,
    ) -> Result<&RgbaImage> {
        let image = composite::decode_data_uri(data_uri)?.to_rgba8();
        Ok(self.composite_with(offset, &image, CompositeMode::Replace))
    }

    /// Decodes a `data:image/png;base64,` URI, resizes the image to
    /// `width x height` (Lanczos3) and blends it onto the canvas at `offset`.
    ///
    /// A zero `width` or `height` keeps the aspect ratio.
    pub fn composite_from_data_uri_resized(
        &mut self,
        offset: (i64, i64),
        data_uri: &str,
        width: u32,
        height: u32,
    ) -> Result<&RgbaImage> {
        let image = composite::decode_data_uri(data_uri)?;
        let resized = composite::resize(&image, width, height);
        Ok(self.composite_with(offset, &resized, CompositeMode::SourceOver))
    }
}

/// canvas access
impl TextCanvas {
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_canvas(self) -> RgbaImage {
        self.canvas
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::test_support::{TEST_FONT, png_data_uri};

    fn canvas_with_font(width: u32, height: u32, background: Rgba<u8>) -> TextCanvas {
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(width, height)), Some(background));
        canvas.set_font_from_bytes(TEST_FONT, 0).unwrap();
        canvas
    }

    #[test]
    fn defaults() {
        let canvas = TextCanvas::new(None, None);
        assert_eq!((canvas.width(), canvas.height()), (320, 240));
        assert_eq!(canvas.background(), TRANSPARENT);
        assert_eq!(canvas.font_size(), 14.0);
        assert!(canvas.font().is_none());
    }

    #[test]
    fn with_config_uses_given_size_and_background() {
        let canvas = TextCanvas::with_config(TextCanvasConfig {
            width: 10,
            height: 5,
            background: WHITE,
            ..Default::default()
        });
        assert_eq!(canvas.canvas().dimensions(), (10, 5));
        assert_eq!(canvas.background(), WHITE);
    }

    #[test]
    fn font_size_zero_selects_default() {
        let mut canvas = TextCanvas::default();
        canvas.set_font_size(0.0);
        assert_eq!(canvas.font_size(), 14.0);
        canvas.set_font_size(21.5);
        assert_eq!(canvas.font_size(), 21.5);
        canvas.set_font_size(-3.0);
        assert_eq!(canvas.font_size(), -3.0);
    }

    #[test]
    fn set_font_rejects_absent_font() {
        let mut canvas = TextCanvas::default();
        assert!(matches!(canvas.set_font(None), Err(Error::InvalidFont)));
        assert!(canvas.font().is_none());
    }

    #[test]
    fn set_font_from_path_reports_io_and_parse_errors() {
        let mut canvas = TextCanvas::default();
        assert!(matches!(
            canvas.set_font_from_path("/nonexistent/font.ttf"),
            Err(Error::Io { .. })
        ));
        assert!(matches!(
            canvas.set_font_from_bytes(b"garbage", 0),
            Err(Error::FontParse(_))
        ));
        assert!(canvas.font().is_none());
    }

    #[test]
    fn draw_text_without_font_is_invalid_font() {
        let mut canvas = TextCanvas::new(None, Some(WHITE));
        let err = canvas.draw_text(None, &["hello"]).unwrap_err();
        assert!(matches!(err, Error::InvalidFont));
        // canvas untouched
        assert!(canvas.canvas().pixels().all(|p| *p == TRANSPARENT));

        assert!(matches!(
            canvas.add_text_line((0, 0), "hello", None),
            Err(Error::InvalidFont)
        ));
        assert!(matches!(canvas.to_png(&["x"], None), Err(Error::InvalidFont)));
    }

    #[test]
    fn draw_text_then_png_decodes_to_canvas_size() {
        let mut canvas = canvas_with_font(120, 80, WHITE);
        canvas.set_font_size(16.0);
        canvas.draw_text(None, &["Hello", "World"]).unwrap();
        let png = canvas.png().unwrap();
        assert!(!png.is_empty());

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (120, 80));
        assert_eq!(&decoded, canvas.canvas());
        assert!(decoded.pixels().any(|p| p[0] < 128));
    }

    #[test]
    fn to_png_round_trip_keeps_dimensions() {
        let mut canvas = canvas_with_font(64, 32, TRANSPARENT);
        let png = canvas.to_png(&["A"], Some(Rgba([255, 0, 0, 255]))).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
        assert!(decoded.to_rgba8().pixels().any(|p| p[3] > 0 && p[0] > 0));
    }

    #[test]
    fn lines_are_spaced_by_three_font_sizes() {
        let mut canvas = canvas_with_font(100, 100, WHITE);
        canvas.set_font_size(10.0);
        canvas.draw_text(None, &["H", "H"]).unwrap();

        let inked_rows: Vec<u32> = (0..100)
            .filter(|&y| (0..100).any(|x| canvas.canvas().get_pixel(x, y)[0] < 128))
            .collect();
        // first line ends at baseline 10, second line sits on baseline 40
        assert!(inked_rows.iter().all(|&y| y < 11 || (y > 30 && y < 41)));
        assert!(inked_rows.iter().any(|&y| y < 11));
        assert!(inked_rows.iter().any(|&y| y > 30));
    }

    #[test]
    fn draw_text_erases_previous_content() {
        let mut canvas = canvas_with_font(80, 40, WHITE);
        canvas.draw_text(None, &["first"]).unwrap();
        let red = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        canvas.composite_image((60, 25), &red);

        canvas.draw_text(None, &[""]).unwrap();
        assert!(canvas.canvas().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn non_positive_size_draws_only_background() {
        let mut canvas = canvas_with_font(40, 40, WHITE);
        canvas.set_font_size(-12.0);
        canvas.draw_text(None, &["degenerate"]).unwrap();
        assert!(canvas.canvas().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn add_text_line_keeps_existing_content() {
        let mut canvas = canvas_with_font(100, 60, WHITE);
        canvas.clear();
        let red = RgbaImage::from_pixel(5, 5, Rgba([255, 0, 0, 255]));
        canvas.composite_image((90, 50), &red);

        canvas.set_font_size(12.0);
        canvas.add_text_line((10, 20), "Hi", None).unwrap();

        assert_eq!(*canvas.canvas().get_pixel(92, 52), Rgba([255, 0, 0, 255]));
        let inked = |x: u32, y: u32| canvas.canvas().get_pixel(x, y)[0] < 128;
        assert!((0..100).any(|x| (20..33).any(|y| inked(x, y))));
        assert!(!(0..10).any(|x| (0..60).any(|y| inked(x, y))));
        assert!(!(0..100).any(|x| (0..18).any(|y| inked(x, y))));
    }

    #[test]
    fn composite_image_is_deterministic_on_reset_canvas() {
        let mut source = RgbaImage::new(6, 6);
        for (x, y, p) in source.enumerate_pixels_mut() {
            *p = Rgba([x as u8 * 40, y as u8 * 40, 90, 128 + x as u8 * 20]);
        }

        let background = Rgba([20, 40, 60, 255]);
        let mut a = TextCanvas::new(Some(RgbaImage::new(16, 16)), Some(background));
        let mut b = TextCanvas::new(Some(RgbaImage::new(16, 16)), Some(background));
        a.clear();
        b.clear();
        a.composite_image((3, 4), &source);
        b.composite_image((3, 4), &source);

        assert_eq!(a.canvas(), b.canvas());
        assert_ne!(*a.canvas().get_pixel(3, 4), background);
        assert_eq!(*a.canvas().get_pixel(0, 0), background);
    }

    #[test]
    fn composite_image_blends_with_source_alpha() {
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(4, 4)), Some(WHITE));
        canvas.clear();
        let source = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 128]));
        canvas.composite_image((0, 0), &source);

        let p = *canvas.canvas().get_pixel(0, 0);
        assert_eq!(p[3], 255);
        assert!(p[0] > 100 && p[0] < 160);
    }

    #[test]
    fn composite_from_data_uri_replaces_pixels() {
        let mut source = RgbaImage::new(3, 2);
        for (x, y, p) in source.enumerate_pixels_mut() {
            *p = Rgba([x as u8 * 50, y as u8 * 50, 200, 60 * (x as u8 + 1)]);
        }

        let mut canvas = TextCanvas::new(Some(RgbaImage::new(8, 8)), Some(WHITE));
        canvas.clear();
        canvas
            .composite_from_data_uri((2, 3), &png_data_uri(&source))
            .unwrap();

        for (x, y, p) in source.enumerate_pixels() {
            assert_eq!(canvas.canvas().get_pixel(x + 2, y + 3), p);
        }
        assert_eq!(*canvas.canvas().get_pixel(1, 3), WHITE);
        assert_eq!(*canvas.canvas().get_pixel(5, 3), WHITE);
    }

    #[test]
    fn composite_from_data_uri_rejects_malformed_base64() {
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(4, 4)), Some(WHITE));
        canvas.clear();
        let err = canvas
            .composite_from_data_uri((0, 0), "data:image/png;base64,%%%")
            .unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Base64(_))));
        assert!(canvas.canvas().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn composite_from_data_uri_resized_covers_requested_size() {
        let source = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(30, 30)), Some(WHITE));
        canvas.clear();
        canvas
            .composite_from_data_uri_resized((5, 6), &png_data_uri(&source), 10, 7)
            .unwrap();

        let covered: Vec<(u32, u32)> = canvas
            .canvas()
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != WHITE)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(covered.len(), 10 * 7);
        assert!(covered.iter().all(|&(x, y)| (5..15).contains(&x) && (6..13).contains(&y)));
    }

    #[test]
    fn composite_from_data_uri_resized_blends() {
        let source = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(8, 8)), Some(WHITE));
        canvas.clear();
        canvas
            .composite_from_data_uri_resized((0, 0), &png_data_uri(&source), 4, 4)
            .unwrap();
        assert!(canvas.canvas().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn set_font_from_storage_matches_registered_family() {
        let mut canvas = TextCanvas::default();
        canvas.font_storage_mut().load_font_binary(TEST_FONT);

        canvas
            .set_font_from_storage(&[fontdb::Family::Name("Tuffy")])
            .unwrap();
        assert!(canvas.font().is_some());
        canvas.draw_text(None, &["Tuffy"]).unwrap();
    }

    #[test]
    fn set_font_from_storage_uses_generic_family_mapping() {
        let mut canvas = TextCanvas::default();
        canvas.font_storage_mut().load_font_binary(TEST_FONT);

        // "Arial" is the default sans-serif mapping and is not registered
        assert!(matches!(
            canvas.set_font_from_storage(&[fontdb::Family::SansSerif]),
            Err(Error::InvalidFont)
        ));

        canvas.font_storage_mut().set_sans_serif_family("Tuffy");
        canvas
            .set_font_from_storage(&[fontdb::Family::SansSerif])
            .unwrap();
        assert!(canvas.font().is_some());
    }

    #[test]
    fn set_font_from_storage_without_match_is_invalid_font() {
        let mut canvas = TextCanvas::default();
        canvas.font_storage_mut().load_font_binary(TEST_FONT);

        let err = canvas
            .set_font_from_storage(&[fontdb::Family::Name("zz-no-such-family-zz")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFont));
        assert!(canvas.font().is_none());
    }

    #[test]
    fn set_font_from_system_without_match_is_invalid_font() {
        let mut canvas = TextCanvas::default();
        let err = canvas
            .set_font_from_system(&[fontdb::Family::Name("zz-no-such-family-zz")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFont));
        assert!(canvas.font().is_none());
    }

    #[test]
    fn set_font_from_system_keeps_previously_registered_fonts() {
        let mut canvas = TextCanvas::default();
        canvas.font_storage_mut().load_font_binary(TEST_FONT);

        canvas
            .set_font_from_system(&[fontdb::Family::Name("Tuffy")])
            .unwrap();
        assert!(canvas.font().is_some());
    }

    #[test]
    fn png_does_not_mutate_canvas() {
        let mut canvas = TextCanvas::new(Some(RgbaImage::new(5, 5)), Some(WHITE));
        canvas.clear();
        let before = canvas.canvas().clone();
        let first = canvas.png().unwrap();
        let second = canvas.png().unwrap();
        assert_eq!(first, second);
        assert_eq!(canvas.canvas(), &before);
    }

    #[test]
    fn changing_font_clears_glyph_cache() {
        let mut canvas = canvas_with_font(60, 30, WHITE);
        canvas.draw_text(None, &["abc"]).unwrap();
        assert!(!canvas.renderer.cache().is_empty());

        let font = canvas.font().cloned().unwrap();
        canvas.set_font(font).unwrap();
        assert!(canvas.renderer.cache().is_empty());
    }
}
