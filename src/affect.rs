//! Affect mapping
//!
//! Projects a fused cognitive model onto the valence/arousal plane.

use crate::types::{CognitiveStateModel, EmotionalState};
use chrono::{DateTime, Utc};

/// Deterministic cognitive-to-affect transform
pub struct AffectMapper;

impl AffectMapper {
    /// Build the public state for `model` at time `at`
    pub fn map(
        model: &CognitiveStateModel,
        context: Option<String>,
        at: DateTime<Utc>,
    ) -> EmotionalState {
        EmotionalState {
            timestamp: at,
            focus: model.focus,
            stress: model.stress,
            confusion: model.confusion,
            flow: model.flow,
            valence: valence(model),
            arousal: arousal(model),
            context,
        }
    }
}

/// Flow, low stress and clarity read as positive affect (-1 to 1)
fn valence(model: &CognitiveStateModel) -> f64 {
    let positive = 0.5 * model.flow + 0.3 * (1.0 - model.stress) + 0.2 * (1.0 - model.confusion);
    (2.0 * positive - 1.0).clamp(-1.0, 1.0)
}

/// Engagement from focus and stress (0-1)
fn arousal(model: &CognitiveStateModel) -> f64 {
    (0.4 * model.focus + 0.6 * model.stress).clamp(0.0, 1.0)
}
