//! Facial expression transform
//!
//! Focus blends expression calm with gaze stability; stress weighs the
//! negative expressions.

use super::{check_confidence, check_finite, Contribution, SourceTransform};
use crate::error::EngineError;
use crate::types::{FacialReading, SourceKind};

/// Gaze stability assumed when the detector did not locate the eyes
const DEFAULT_GAZE_STABILITY: f64 = 0.5;

impl SourceTransform for FacialReading {
    fn validate(&self) -> Result<(), EngineError> {
        let kind = SourceKind::Facial;
        check_confidence(kind, self.confidence)?;

        let e = &self.emotions;
        for (name, value) in [
            ("neutral", e.neutral),
            ("happy", e.happy),
            ("sad", e.sad),
            ("angry", e.angry),
            ("fearful", e.fearful),
            ("disgusted", e.disgusted),
            ("surprised", e.surprised),
        ] {
            check_finite(kind, name, value)?;
        }

        if let Some(gaze) = &self.gaze {
            check_finite(kind, "gaze.x", gaze.x)?;
            check_finite(kind, "gaze.y", gaze.y)?;
        }

        Ok(())
    }

    fn contribution(&self) -> Contribution {
        Contribution {
            focus: Some(focus_from_facial(self)),
            stress: Some(stress_from_facial(self)),
            ..Default::default()
        }
    }
}

/// Neutral expression with few startle cues, averaged with gaze stability
fn focus_from_facial(reading: &FacialReading) -> f64 {
    let e = &reading.emotions;
    let expression = 0.8 * e.neutral - 0.3 * e.surprised - 0.2 * e.fearful;

    let gaze_stability = reading
        .gaze
        .map(|g| 1.0 - (g.x - 0.5).abs() - (g.y - 0.5).abs())
        .unwrap_or(DEFAULT_GAZE_STABILITY);

    (expression + gaze_stability) / 2.0
}

fn stress_from_facial(reading: &FacialReading) -> f64 {
    let e = &reading.emotions;
    0.4 * e.angry + 0.3 * e.fearful + 0.2 * e.sad
}
