use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`TextCanvas`](crate::TextCanvas) and its helpers.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable font: none was supplied, none is set, or it carries no glyphs.
    #[error("invalid font: no usable font is set")]
    InvalidFont,

    /// The font file could not be read.
    #[error("failed to read font file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `fontdue` rejected the font bytes.
    #[error("failed to parse font: {0}")]
    FontParse(&'static str),

    /// A composited image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[from] DecodeError),

    /// The canvas could not be encoded as PNG.
    #[error("failed to encode png: {0}")]
    Serialization(#[source] image::ImageError),
}

/// Cause of an [`Error::Decode`].
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid image payload: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
