//! Quality gate for local OCR results.
//!
//! A local result is ACCEPTED if and only if:
//!
//! * it exists (the engine did not fail),
//! * its text is non-empty,
//! * its text has at least `min_acceptable_length` characters, and
//! * its confidence is unknown, or at least `min_acceptable_confidence`.
//!
//! An unknown confidence never disqualifies a result; a known low one does.
//! Length counts Unicode scalar values, so a Hangul syllable counts once.

use crate::config::GateConfig;
use crate::ocr::LocalRecognition;

/// Why a local result was not trusted.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The engine failed, so there is nothing to judge.
    Absent,
    Empty,
    TooShort { length: usize, min: usize },
    LowConfidence { confidence: f32, min: f32 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Absent => write!(f, "no local result"),
            RejectReason::Empty => write!(f, "empty text"),
            RejectReason::TooShort { length, min } => {
                write!(f, "text too short ({length} < {min} chars)")
            }
            RejectReason::LowConfidence { confidence, min } => {
                write!(f, "confidence too low ({confidence:.1} < {min:.1})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Accepted,
    Rejected(RejectReason),
}

impl GateVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateVerdict::Accepted)
    }
}

/// Length and confidence thresholds, injected into the orchestrator.
///
/// ```
/// use math_ocr::ocr::LocalRecognition;
/// use math_ocr::pipeline::QualityGate;
///
/// let gate = QualityGate::default();
/// let short = LocalRecognition::new("x=5", Some(80.0));
/// assert!(!gate.evaluate(Some(&short)).is_accepted());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_acceptable_length: usize,
    pub min_acceptable_confidence: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::from(&GateConfig::default())
    }
}

impl From<&GateConfig> for QualityGate {
    fn from(config: &GateConfig) -> Self {
        Self {
            min_acceptable_length: config.min_acceptable_length,
            min_acceptable_confidence: config.min_acceptable_confidence,
        }
    }
}

impl QualityGate {
    pub fn new(min_acceptable_length: usize, min_acceptable_confidence: f32) -> Self {
        Self {
            min_acceptable_length,
            min_acceptable_confidence,
        }
    }

    pub fn evaluate(&self, result: Option<&LocalRecognition>) -> GateVerdict {
        let Some(result) = result else {
            return GateVerdict::Rejected(RejectReason::Absent);
        };

        if result.text.is_empty() {
            return GateVerdict::Rejected(RejectReason::Empty);
        }

        let length = result.text.chars().count();
        if length < self.min_acceptable_length {
            return GateVerdict::Rejected(RejectReason::TooShort {
                length,
                min: self.min_acceptable_length,
            });
        }

        // NaN compares false, so it is treated like an unknown confidence.
        if let Some(confidence) = result.confidence {
            if confidence < self.min_acceptable_confidence {
                return GateVerdict::Rejected(RejectReason::LowConfidence {
                    confidence,
                    min: self.min_acceptable_confidence,
                });
            }
        }

        GateVerdict::Accepted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
