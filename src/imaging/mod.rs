//! Upload classification and the image normalizer.
//!
//! # Pipeline
//!
//! ```text
//! file bytes → SourceImage (kind decided once) → normalize(rotation) → PixelBuffer (PNG)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use math_ocr::imaging::{normalize, SourceImage};
//!
//! let mut image = SourceImage::load("worksheet.jpg").unwrap();
//! image.rotate_clockwise();
//! let buffer = normalize(&image).unwrap();
//! println!("{}x{}", buffer.width(), buffer.height());
//! ```

pub mod normalize;
pub mod source;

pub use normalize::{normalize, normalize_bytes, DecodeError, PixelBuffer};
pub use source::{ImageKind, Rotation, SourceImage, UploadError, UNSUPPORTED_UPLOAD_NOTICE};
