pub mod cpu_renderer;
pub mod glyph_cache;

pub use cpu_renderer::CpuRenderer;
pub use glyph_cache::{GlyphCache, GlyphCacheItem};
