//! Wearable physiology transform
//!
//! Elevated heart rate and suppressed HRV both read as stress.

use super::{check_confidence, check_finite, Contribution, SourceTransform};
use crate::error::EngineError;
use crate::types::{SourceKind, WearableReading};

/// Stress term used when the underlying metric is absent
const MISSING_METRIC_STRESS: f64 = 0.5;

/// Resting reference heart rate (bpm)
const RESTING_HR_BPM: f64 = 60.0;

/// Heart rate span mapped onto the full stress range (bpm)
const HR_STRESS_SPAN_BPM: f64 = 40.0;

/// HRV at which HRV-derived stress reaches zero (ms)
const HRV_CEILING_MS: f64 = 100.0;

impl SourceTransform for WearableReading {
    fn validate(&self) -> Result<(), EngineError> {
        let kind = SourceKind::Wearable;
        check_confidence(kind, self.confidence)?;

        for (name, value) in [
            ("heart_rate", self.heart_rate),
            ("heart_rate_variability", self.heart_rate_variability),
            ("skin_temperature", self.skin_temperature),
        ] {
            if let Some(v) = value {
                check_finite(kind, name, v)?;
            }
        }

        if let Some(a) = &self.accelerometer {
            check_finite(kind, "accelerometer.x", a.x)?;
            check_finite(kind, "accelerometer.y", a.y)?;
            check_finite(kind, "accelerometer.z", a.z)?;
        }

        Ok(())
    }

    fn contribution(&self) -> Contribution {
        Contribution {
            stress: Some(stress_from_wearable(self)),
            ..Default::default()
        }
    }
}

fn stress_from_wearable(w: &WearableReading) -> f64 {
    let hr_stress = w
        .heart_rate
        .map(|hr| ((hr - RESTING_HR_BPM) / HR_STRESS_SPAN_BPM).max(0.0))
        .unwrap_or(MISSING_METRIC_STRESS);

    let hrv_stress = w
        .heart_rate_variability
        .map(|hrv| 1.0 - hrv / HRV_CEILING_MS)
        .unwrap_or(MISSING_METRIC_STRESS);

    (hr_stress + hrv_stress) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_absent() {
        let w = WearableReading {
            confidence: 0.6,
            ..Default::default()
        };
        assert_eq!(w.contribution().stress, Some(0.5));
    }

    #[test]
    fn test_elevated_heart_rate_low_hrv() {
        let w = WearableReading {
            confidence: 0.6,
            heart_rate: Some(90.0),
            heart_rate_variability: Some(40.0),
            ..Default::default()
        };
        // (0.75 + 0.6) / 2
        assert!((w.contribution().stress.unwrap() - 0.675).abs() < 1e-12);
    }

    #[test]
    fn test_heart_rate_below_rest_floors_at_zero() {
        let w = WearableReading {
            confidence: 0.6,
            heart_rate: Some(50.0),
            heart_rate_variability: Some(100.0),
            ..Default::default()
        };
        assert_eq!(w.contribution().stress, Some(0.0));
    }

    #[test]
    fn test_zero_heart_rate_is_a_measurement() {
        let w = WearableReading {
            confidence: 0.6,
            heart_rate: Some(0.0),
            ..Default::default()
        };
        // hr term floors at 0, hrv term defaults to 0.5
        assert_eq!(w.contribution().stress, Some(0.25));
    }
}
