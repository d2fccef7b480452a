//! Image normalizer: decode, rotate, re-encode.
//!
//! Every call decodes into a fresh surface owned by the call itself, so the
//! [`SourceImage`] is never touched and the surface is released on every
//! exit path, including errors.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use super::source::{Rotation, SourceImage};

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// The image could not be rasterised.  Aborts the OCR request before any
/// engine is called.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("cannot re-encode image: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// PixelBuffer
// ---------------------------------------------------------------------------

/// Canonical input for recognition: a PNG in upright orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    png: Vec<u8>,
}

impl PixelBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// PNG-encoded pixels.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub const MIME: &'static str = "image/png";
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Render `source` at its current rotation.
pub fn normalize(source: &SourceImage) -> Result<PixelBuffer, DecodeError> {
    normalize_bytes(source.bytes(), source.rotation())
}

/// Render raw encoded bytes rotated clockwise by `rotation`.
///
/// Width and height are swapped for 90 and 270 degrees.
pub fn normalize_bytes(bytes: &[u8], rotation: Rotation) -> Result<PixelBuffer, DecodeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| DecodeError::Decode(e.to_string()))?;

    let rotated = rotate(decoded, rotation);

    let mut png = Vec::new();
    rotated
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DecodeError::Encode(e.to_string()))?;

    log::debug!(
        "imaging: normalized {}x{} at {} degrees ({} bytes)",
        rotated.width(),
        rotated.height(),
        rotation.degrees(),
        png.len()
    );

    Ok(PixelBuffer {
        width: rotated.width(),
        height: rotated.height(),
        png,
    })
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Deg0 => img,
        Rotation::Deg90 => img.rotate90(),
        Rotation::Deg180 => img.rotate180(),
        Rotation::Deg270 => img.rotate270(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
