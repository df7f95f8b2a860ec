//! # textimg
//!
//! Renders lines of text onto an RGBA canvas, composites extra images onto it
//! and exports the result as PNG.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use textimg::{TextCanvas, image::{Rgba, RgbaImage}};
//!
//! # fn main() -> textimg::Result<()> {
//! let mut canvas = TextCanvas::new(
//!     Some(RgbaImage::new(1000, 50)),
//!     Some(Rgba([255, 255, 255, 255])),
//! );
//! canvas.set_font_from_path("fonts/DejaVuSans.ttf")?;
//! canvas.set_font_size(14.0);
//!
//! let png = canvas.to_png(&["first line", "second line"], None)?;
//! std::fs::write("text.png", png).expect("write png");
//! # Ok(())
//! # }
//! ```
//!
//! Images taken from HTML `<img src="data:image/png;base64,...">` attributes
//! can be placed with [`TextCanvas::composite_from_data_uri`] and
//! [`TextCanvas::composite_from_data_uri_resized`].

pub mod canvas;
pub mod composite;
pub mod error;
pub mod font_storage;
pub mod glyph_id;
pub mod renderer;
pub mod text;

// common re-exports
pub use canvas::{TextCanvas, TextCanvasConfig};
pub use composite::CompositeMode;
pub use error::{DecodeError, Error, Result};
pub use font_storage::FontStorage;
pub use glyph_id::GlyphId;

// re-export dependencies
pub use fontdb;
pub use fontdue;
pub use image;

#[allow(clippy::unwrap_used)]
#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        num::NonZeroUsize,
        sync::{Arc, OnceLock},
    };

    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use image::{ImageFormat, RgbaImage};

    use crate::{composite::PNG_DATA_URI_PREFIX, renderer::GlyphCache};

    /// Public-domain Tuffy Regular, family name "Tuffy".
    pub const TEST_FONT: &[u8] = include_bytes!("../tests/fonts/Tuffy.ttf");

    pub fn test_font() -> Arc<fontdue::Font> {
        static FONT: OnceLock<Arc<fontdue::Font>> = OnceLock::new();

        FONT.get_or_init(|| Arc::new(crate::font_storage::parse_font(TEST_FONT, 0).unwrap()))
            .clone()
    }

    pub fn default_cache() -> GlyphCache {
        GlyphCache::new(&[(
            NonZeroUsize::new(4096).unwrap(),
            NonZeroUsize::new(64).unwrap(),
        )])
    }

    pub fn png_data_uri(image: &RgbaImage) -> String {
        let mut png = std::io::Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png).unwrap();
        format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(png.into_inner()))
    }
}
