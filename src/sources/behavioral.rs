//! Behavioral biometrics transform
//!
//! Typing cadence and pointer activity inform focus, confusion and flow.

use super::{check_confidence, check_finite, Contribution, SourceTransform};
use crate::error::EngineError;
use crate::types::{BehavioralReading, SourceKind};

impl SourceTransform for BehavioralReading {
    fn validate(&self) -> Result<(), EngineError> {
        let kind = SourceKind::Behavioral;
        check_confidence(kind, self.confidence)?;
        check_finite(kind, "typing_speed", self.typing_speed)?;
        check_finite(kind, "error_rate", self.error_rate)?;
        check_finite(kind, "mouse_movements", self.mouse_movements)?;
        check_finite(kind, "click_rate", self.click_rate)?;
        check_finite(kind, "pause_duration", self.pause_duration)
    }

    fn contribution(&self) -> Contribution {
        Contribution {
            focus: Some(focus_from_behavioral(self)),
            confusion: Some(confusion_from_behavioral(self)),
            flow: Some(flow_from_behavioral(self)),
            ..Default::default()
        }
    }
}

/// Consistent typing, few corrections and short pauses
fn focus_from_behavioral(b: &BehavioralReading) -> f64 {
    let typing_consistency = if b.typing_speed > 40.0 && b.typing_speed < 120.0 {
        1.0
    } else {
        0.5
    };
    let low_errors = 1.0 - b.error_rate;
    let steady_pacing = if b.pause_duration < 2000.0 { 0.8 } else { 0.4 };

    (typing_consistency + low_errors + steady_pacing) / 3.0
}

/// Corrections plus erratic pointer movement
fn confusion_from_behavioral(b: &BehavioralReading) -> f64 {
    let erratic_pointer = if b.mouse_movements > 100.0 { 0.4 } else { 0.1 };
    0.6 * b.error_rate + erratic_pointer
}

fn flow_from_behavioral(b: &BehavioralReading) -> f64 {
    let optimal_speed = b.typing_speed > 60.0 && b.typing_speed < 100.0;
    let low_errors = b.error_rate < 0.1;
    let steady_rhythm = b.pause_duration > 500.0 && b.pause_duration < 1500.0;

    match (optimal_speed && low_errors, steady_rhythm) {
        (true, true) => 0.9,
        (true, false) => 0.7,
        _ => 0.4,
    }
}
