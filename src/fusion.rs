//! Multimodal fusion
//!
//! Combines the readings collected in one cycle into a single
//! [`CognitiveStateModel`]. Each accepted reading adds its confidence-weighted
//! contribution onto a fixed baseline, and the sums are then divided by the
//! total observed weight and clamped to [0, 1].
//!
//! The baseline itself is not weighted, so a lone low-confidence source can
//! push dimensions well past 1.0 before clamping.

use crate::sources::SourceTransform;
use crate::types::{CognitiveStateModel, SourceKind, SourceReading};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Starting point for every dimension before any reading is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub focus: f64,
    pub stress: f64,
    pub confusion: f64,
    pub flow: f64,
}

pub const BASELINE: Baseline = Baseline {
    focus: 0.5,
    stress: 0.3,
    confusion: 0.2,
    flow: 0.4,
};

/// Reading excluded from a fusion cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedReading {
    /// Unknown when the reading could not be decoded at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    pub reason: String,
}

/// Fused model plus the readings that were left out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    pub model: CognitiveStateModel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedReading>,
}

/// Stateless fusion engine
pub struct FusionEngine;

impl FusionEngine {
    /// Fuse a reading set into a cognitive state model
    pub fn compute_state(readings: &[SourceReading]) -> CognitiveStateModel {
        Self::fuse(readings).model
    }

    /// Fuse a reading set, reporting any reading that was rejected.
    ///
    /// Malformed readings and repeated source kinds are excluded as if absent.
    /// Accepted readings are folded in canonical kind order, so the result does
    /// not depend on the order readings arrive in.
    pub fn fuse(readings: &[SourceReading]) -> FusionReport {
        let mut slots: [Option<&SourceReading>; 4] = [None; 4];
        let mut rejected = Vec::new();

        for reading in readings {
            let kind = reading.kind();

            if let Err(e) = reading.validate() {
                warn!("Rejecting {} reading: {}", kind.as_str(), e);
                rejected.push(RejectedReading {
                    source: Some(kind),
                    reason: e.to_string(),
                });
                continue;
            }

            let slot = &mut slots[kind as usize];
            if slot.is_some() {
                warn!("Rejecting duplicate {} reading", kind.as_str());
                rejected.push(RejectedReading {
                    source: Some(kind),
                    reason: format!("duplicate {} reading", kind.as_str()),
                });
                continue;
            }
            *slot = Some(reading);
        }

        let mut acc = Accumulator::new(BASELINE);
        for reading in slots.iter().flatten() {
            acc.add(reading);
        }

        let model = acc.finish();
        debug!(
            "Fused {} source(s), confidence {:.3}, {} rejected",
            model.sources.len(),
            model.confidence,
            rejected.len()
        );

        FusionReport { model, rejected }
    }
}

/// Running weighted sums for one cycle
struct Accumulator {
    baseline: Baseline,
    focus: f64,
    stress: f64,
    confusion: f64,
    flow: f64,
    total_weight: f64,
    sources: Vec<SourceKind>,
}

impl Accumulator {
    fn new(baseline: Baseline) -> Self {
        Self {
            baseline,
            focus: baseline.focus,
            stress: baseline.stress,
            confusion: baseline.confusion,
            flow: baseline.flow,
            total_weight: 0.0,
            sources: Vec::with_capacity(SourceKind::ALL.len()),
        }
    }

    fn add(&mut self, reading: &SourceReading) {
        let weight = reading.confidence();
        let c = reading.contribution();

        if let Some(v) = c.focus {
            self.focus += v * weight;
        }
        if let Some(v) = c.stress {
            self.stress += v * weight;
        }
        if let Some(v) = c.confusion {
            self.confusion += v * weight;
        }
        if let Some(v) = c.flow {
            self.flow += v * weight;
        }

        self.total_weight += weight;
        self.sources.push(reading.kind());
    }

    fn finish(self) -> CognitiveStateModel {
        let confidence = if self.sources.is_empty() {
            0.0
        } else {
            (self.total_weight / self.sources.len() as f64).clamp(0.0, 1.0)
        };

        if self.total_weight > 0.0 {
            let w = self.total_weight;
            CognitiveStateModel {
                focus: (self.focus / w).clamp(0.0, 1.0),
                stress: (self.stress / w).clamp(0.0, 1.0),
                confusion: (self.confusion / w).clamp(0.0, 1.0),
                flow: (self.flow / w).clamp(0.0, 1.0),
                confidence,
                sources: self.sources,
            }
        } else {
            CognitiveStateModel {
                focus: self.baseline.focus,
                stress: self.baseline.stress,
                confusion: self.baseline.confusion,
                flow: self.baseline.flow,
                confidence,
                sources: self.sources,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BehavioralReading, FacialEmotions, FacialReading, Gaze, VocalEmotion, VocalReading,
        WearableReading,
    };
    use pretty_assertions::assert_eq;

    fn behavioral(confidence: f64) -> SourceReading {
        SourceReading::Behavioral(BehavioralReading {
            confidence,
            typing_speed: 80.0,
            error_rate: 0.05,
            mouse_movements: 50.0,
            click_rate: 5.0,
            pause_duration: 1000.0,
            captured_at: None,
        })
    }

    fn vocal(confidence: f64, emotion: VocalEmotion) -> SourceReading {
        SourceReading::Vocal(VocalReading {
            confidence,
            pitch: 200.0,
            energy: 0.7,
            speech_rate: 5.0,
            emotion,
            captured_at: None,
        })
    }

    fn wearable(confidence: f64) -> SourceReading {
        SourceReading::Wearable(WearableReading {
            confidence,
            heart_rate: Some(90.0),
            heart_rate_variability: Some(40.0),
            ..Default::default()
        })
    }

    fn facial(confidence: f64) -> SourceReading {
        SourceReading::Facial(FacialReading {
            confidence,
            emotions: FacialEmotions {
                neutral: 0.7,
                angry: 0.1,
                sad: 0.1,
                ..Default::default()
            },
            gaze: Some(Gaze { x: 0.4, y: 0.6 }),
            captured_at: None,
        })
    }

    #[test]
    fn test_empty_set_is_baseline() {
        let model = FusionEngine::compute_state(&[]);

        assert_eq!(
            model,
            CognitiveStateModel {
                focus: 0.5,
                stress: 0.3,
                confusion: 0.2,
                flow: 0.4,
                confidence: 0.0,
                sources: vec![],
            }
        );
    }

    #[test]
    fn test_single_behavioral_reading() {
        let model = FusionEngine::compute_state(&[behavioral(0.8)]);

        // focus (0.5 + 0.91667 * 0.8) / 0.8 = 1.5417 -> clamped
        assert_eq!(model.focus, 1.0);
        assert!((model.stress - 0.375).abs() < 1e-9);
        assert!((model.confusion - 0.38).abs() < 1e-9);
        // flow (0.4 + 0.9 * 0.8) / 0.8 = 1.4 -> clamped
        assert_eq!(model.flow, 1.0);
        assert!((model.confidence - 0.8).abs() < 1e-12);
        assert_eq!(model.sources, vec![SourceKind::Behavioral]);
    }

    #[test]
    fn test_zero_confidence_keeps_baseline() {
        let model = FusionEngine::compute_state(&[vocal(0.0, VocalEmotion::Stressed)]);

        assert_eq!(model.stress, BASELINE.stress);
        assert_eq!(model.focus, BASELINE.focus);
        assert_eq!(model.confidence, 0.0);
        assert_eq!(model.sources, vec![SourceKind::Vocal]);
    }

    #[test]
    fn test_confidence_clamped_for_many_sources() {
        let readings = vec![facial(1.0), vocal(1.0, VocalEmotion::Calm), behavioral(1.0), wearable(1.0)];
        let model = FusionEngine::compute_state(&readings);

        assert_eq!(model.confidence, 1.0);
        assert_eq!(model.sources, SourceKind::ALL.to_vec());
    }

    #[test]
    fn test_order_independent_and_deterministic() {
        let forward = vec![facial(0.9), vocal(0.7, VocalEmotion::Stressed), behavioral(0.8), wearable(0.6)];
        let reversed: Vec<SourceReading> = forward.iter().rev().cloned().collect();

        let a = FusionEngine::compute_state(&forward);
        let b = FusionEngine::compute_state(&forward);
        let c = FusionEngine::compute_state(&reversed);

        assert_eq!(a.focus.to_bits(), b.focus.to_bits());
        assert_eq!(a.stress.to_bits(), c.stress.to_bits());
        assert_eq!(a.confusion.to_bits(), c.confusion.to_bits());
        assert_eq!(a, c);
    }

    #[test]
    fn test_dimensions_stay_in_range() {
        let extreme = SourceReading::Behavioral(BehavioralReading {
            confidence: 0.01,
            typing_speed: 1e6,
            error_rate: 50.0,
            mouse_movements: 1e6,
            click_rate: 0.0,
            pause_duration: -1e6,
            captured_at: None,
        });
        let model = FusionEngine::compute_state(&[extreme, wearable(0.01)]);

        for v in [model.focus, model.stress, model.confusion, model.flow, model.confidence] {
            assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
        }
    }

    #[test]
    fn test_malformed_reading_excluded() {
        let report = FusionEngine::fuse(&[behavioral(1.5), vocal(0.5, VocalEmotion::Calm)]);

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].source, Some(SourceKind::Behavioral));
        assert_eq!(report.model.sources, vec![SourceKind::Vocal]);
        assert_eq!(report.model, FusionEngine::compute_state(&[vocal(0.5, VocalEmotion::Calm)]));
    }

    #[test]
    fn test_duplicate_kind_keeps_first() {
        let report = FusionEngine::fuse(&[
            vocal(0.5, VocalEmotion::Calm),
            vocal(0.9, VocalEmotion::Stressed),
        ]);

        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reason.contains("duplicate"));
        // (0.3 + 0.2 * 0.5) / 0.5
        assert!((report.model.stress - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_multi_source_weighted_stress() {
        let model = FusionEngine::compute_state(&[
            vocal(0.5, VocalEmotion::Stressed),
            wearable(0.5),
        ]);

        // (0.3 + 0.8 * 0.5 + 0.675 * 0.5) / 1.0 = 1.0375 -> clamped
        assert_eq!(model.stress, 1.0);
        // focus untouched by either source: 0.5 / 1.0
        assert!((model.focus - 0.5).abs() < 1e-12);
        assert!((model.confidence - 0.5).abs() < 1e-12);
    }
}
