/// Line placement of glyphs for a draw call.
pub mod layout;

pub use layout::{GlyphPosition, TextLayout, TextLayoutConfig, TextLayoutLine};
