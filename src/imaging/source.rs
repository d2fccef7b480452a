//! Uploaded files and their classification.
//!
//! A [`SourceImage`] is created once per upload.  Its [`ImageKind`] is
//! decided at that moment (magic bytes first, file extension second) and is
//! never re-derived afterwards; only the [`Rotation`] changes in place.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// User-facing notice when an upload is neither a PDF nor a JPEG.
pub const UNSUPPORTED_UPLOAD_NOTICE: &str = "PDF 또는 JPG 파일만 업로드 가능합니다.";

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is neither the raster kind nor the document kind.
    #[error("unsupported file type: {mime}")]
    UnsupportedKind { mime: String },

    /// Rotations must be multiples of 90 degrees.
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
}

// ---------------------------------------------------------------------------
// ImageKind
// ---------------------------------------------------------------------------

/// Closed set of upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG, the only kind sent to recognition.
    Raster,
    /// PDF, previewable but not recognisable.
    Document,
    Unsupported,
}

impl ImageKind {
    /// Classify a file from its contents, falling back to its name when the
    /// magic bytes are not recognised.  Returns the kind and the MIME type
    /// that decided it.
    ///
    /// ```
    /// use math_ocr::imaging::ImageKind;
    ///
    /// let (kind, mime) = ImageKind::classify(b"%PDF-1.7\n", None);
    /// assert_eq!(kind, ImageKind::Document);
    /// assert_eq!(mime, "application/pdf");
    /// ```
    pub fn classify(bytes: &[u8], file_name: Option<&str>) -> (Self, String) {
        let mime = infer::get(bytes)
            .map(|t| t.mime_type().to_string())
            .or_else(|| {
                file_name
                    .and_then(|name| mime_guess::from_path(name).first_raw())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        (Self::from_mime(&mime), mime)
    }

    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "image/jpeg" => ImageKind::Raster,
            "application/pdf" => ImageKind::Document,
            _ => ImageKind::Unsupported,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageKind::Raster => "JPEG",
            ImageKind::Document => "PDF",
            ImageKind::Unsupported => "unsupported",
        }
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Clockwise rotation applied before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Build a rotation from any multiple of 90 degrees, negative values and
    /// full turns included.
    ///
    /// ```
    /// use math_ocr::imaging::Rotation;
    ///
    /// assert_eq!(Rotation::from_degrees(360).unwrap(), Rotation::Deg0);
    /// assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
    /// assert!(Rotation::from_degrees(45).is_err());
    /// ```
    pub fn from_degrees(degrees: i32) -> Result<Self, UploadError> {
        if degrees % 90 != 0 {
            return Err(UploadError::InvalidRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::Deg0,
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            _ => Rotation::Deg270,
        })
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// The next quarter turn, wrapping 270 back to 0.
    pub fn rotate_clockwise(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    /// `true` for odd quarter turns, where width and height trade places.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

// ---------------------------------------------------------------------------
// SourceImage
// ---------------------------------------------------------------------------

/// One uploaded file.
///
/// Cloning is cheap: the bytes are shared, so the orchestrator can work on a
/// snapshot while the session keeps the original.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    kind: ImageKind,
    mime: String,
    file_name: String,
    rotation: Rotation,
}

impl SourceImage {
    /// Wrap uploaded bytes, classifying them once.
    ///
    /// Unsupported kinds are rejected here so they never reach a session.
    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let bytes: Vec<u8> = bytes.into();
        let file_name = file_name.into();
        let (kind, mime) = ImageKind::classify(&bytes, Some(&file_name));

        if kind == ImageKind::Unsupported {
            return Err(UploadError::UnsupportedKind { mime });
        }

        Ok(Self {
            bytes: bytes.into(),
            kind,
            mime,
            file_name,
            rotation: Rotation::Deg0,
        })
    }

    /// Read and classify a file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Self::from_bytes(bytes, file_name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Advance the rotation by 90 degrees and return the new value.
    pub fn rotate_clockwise(&mut self) -> Rotation {
        self.rotation = self.rotation.rotate_clockwise();
        self.rotation
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
