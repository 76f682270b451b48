//! Source sub-transforms
//!
//! Each detector category maps its reading onto the dimensions it informs.
//! Transforms are pure: the same reading always yields the same contribution.

mod behavioral;
mod facial;
mod vocal;
mod wearable;

use crate::error::EngineError;
use crate::types::{SourceKind, SourceReading};

/// Unweighted per-dimension contribution of a single reading.
///
/// `None` means the source has nothing to say about that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contribution {
    pub focus: Option<f64>,
    pub stress: Option<f64>,
    pub confusion: Option<f64>,
    pub flow: Option<f64>,
}

/// Trait for per-source transforms
pub trait SourceTransform {
    /// Reject readings that would corrupt the weighted aggregate
    fn validate(&self) -> Result<(), EngineError>;

    /// Map the reading onto the dimensions it informs
    fn contribution(&self) -> Contribution;
}

impl SourceTransform for SourceReading {
    fn validate(&self) -> Result<(), EngineError> {
        match self {
            SourceReading::Facial(r) => r.validate(),
            SourceReading::Vocal(r) => r.validate(),
            SourceReading::Behavioral(r) => r.validate(),
            SourceReading::Wearable(r) => r.validate(),
        }
    }

    fn contribution(&self) -> Contribution {
        match self {
            SourceReading::Facial(r) => r.contribution(),
            SourceReading::Vocal(r) => r.contribution(),
            SourceReading::Behavioral(r) => r.contribution(),
            SourceReading::Wearable(r) => r.contribution(),
        }
    }
}

/// Confidence must be a finite weight in [0, 1]
pub(crate) fn check_confidence(kind: SourceKind, confidence: f64) -> Result<(), EngineError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(invalid(kind, format!("confidence {} outside [0, 1]", confidence)))
    }
}

/// Metrics must be finite so they cannot poison the sums
pub(crate) fn check_finite(kind: SourceKind, metric: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(kind, format!("metric {} is not finite", metric)))
    }
}

fn invalid(kind: SourceKind, reason: String) -> EngineError {
    EngineError::InvalidReading {
        source_kind: kind.as_str().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VocalEmotion, VocalReading};

    #[test]
    fn test_confidence_bounds() {
        assert!(check_confidence(SourceKind::Vocal, 0.0).is_ok());
        assert!(check_confidence(SourceKind::Vocal, 1.0).is_ok());
        assert!(check_confidence(SourceKind::Vocal, 1.01).is_err());
        assert!(check_confidence(SourceKind::Vocal, -0.1).is_err());
        assert!(check_confidence(SourceKind::Vocal, f64::NAN).is_err());
    }

    #[test]
    fn test_enum_dispatch() {
        let reading = SourceReading::Vocal(VocalReading {
            confidence: 0.7,
            pitch: 180.0,
            energy: 0.6,
            speech_rate: 4.5,
            emotion: VocalEmotion::Stressed,
            captured_at: None,
        });

        assert!(reading.validate().is_ok());
        assert_eq!(reading.contribution().stress, Some(0.8));
        assert!(reading.contribution().focus.is_none());
    }

    #[test]
    fn test_invalid_reading_error_names_source() {
        let err = check_confidence(SourceKind::Wearable, 2.0).unwrap_err();
        assert!(err.to_string().contains("wearable"));
    }
}
