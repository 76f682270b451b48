//! Vocal emotion transform

use super::{check_confidence, check_finite, Contribution, SourceTransform};
use crate::error::EngineError;
use crate::types::{SourceKind, VocalEmotion, VocalReading};

impl SourceTransform for VocalReading {
    fn validate(&self) -> Result<(), EngineError> {
        let kind = SourceKind::Vocal;
        check_confidence(kind, self.confidence)?;
        check_finite(kind, "pitch", self.pitch)?;
        check_finite(kind, "energy", self.energy)?;
        check_finite(kind, "speech_rate", self.speech_rate)
    }

    fn contribution(&self) -> Contribution {
        Contribution {
            stress: Some(stress_from_vocal(self.emotion)),
            ..Default::default()
        }
    }
}

fn stress_from_vocal(emotion: VocalEmotion) -> f64 {
    match emotion {
        VocalEmotion::Stressed => 0.8,
        VocalEmotion::Excited => 0.5,
        VocalEmotion::Calm => 0.2,
        VocalEmotion::Neutral => 0.4,
    }
}
