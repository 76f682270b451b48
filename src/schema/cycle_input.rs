//! empath.cycle.v1 schema definition
//!
//! One cycle input bundles whatever readings the collectors produced for a
//! single tick. Readings are kept as raw JSON until decoding so that one
//! malformed reading cannot invalidate the others.

use crate::error::EngineError;
use crate::fusion::RejectedReading;
use crate::types::{SourceKind, SourceReading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "empath.cycle.v1";

/// Readings collected for one fusion cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleInput {
    /// Schema version; assumed current when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Cycle time; the processing time is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-text context tag carried onto the emotional state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub readings: Vec<serde_json::Value>,
}

impl CycleInput {
    /// Build an input from already-typed readings
    pub fn from_readings(readings: &[SourceReading]) -> Result<Self, EngineError> {
        let readings = readings
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            readings,
            ..Default::default()
        })
    }

    /// Check the schema version
    pub fn validate(&self) -> Result<(), EngineError> {
        match self.schema_version.as_deref() {
            None | Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(EngineError::ParseError(format!(
                "unsupported schema version: expected {}, got {}",
                SCHEMA_VERSION, other
            ))),
        }
    }

    /// Decode every reading, collecting the ones that fail instead of aborting
    pub fn decode_readings(&self) -> (Vec<SourceReading>, Vec<RejectedReading>) {
        let mut readings = Vec::with_capacity(self.readings.len());
        let mut rejected = Vec::new();

        for value in &self.readings {
            match serde_json::from_value::<SourceReading>(value.clone()) {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    let source = value
                        .get("source")
                        .and_then(|s| serde_json::from_value::<SourceKind>(s.clone()).ok());
                    log::warn!(
                        "Rejecting undecodable {} reading: {}",
                        source.map_or("unknown", |k| k.as_str()),
                        e
                    );
                    rejected.push(RejectedReading {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (readings, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mixed_readings() {
        let json = r#"{
            "schema_version": "empath.cycle.v1",
            "timestamp": "2024-01-15T14:00:00Z",
            "context": "code-review",
            "readings": [
                { "source": "vocal", "confidence": 0.7, "pitch": 180.0, "energy": 0.6, "speech_rate": 4.2, "emotion": "calm" },
                { "source": "behavioral", "confidence": 0.8, "typing_speed": 80.0 },
                { "source": "telepathy", "confidence": 0.9 }
            ]
        }"#;

        let input: CycleInput = serde_json::from_str(json).unwrap();
        assert!(input.validate().is_ok());

        let (readings, rejected) = input.decode_readings();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].kind(), SourceKind::Vocal);

        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].source, Some(SourceKind::Behavioral));
        assert!(rejected[1].source.is_none());
    }

    #[test]
    fn test_minimal_input() {
        let input: CycleInput = serde_json::from_str("{}").unwrap();
        assert!(input.validate().is_ok());
        assert!(input.readings.is_empty());
        assert!(input.timestamp.is_none());
    }

    #[test]
    fn test_wrong_schema_version() {
        let input = CycleInput {
            schema_version: Some("wear.raw_event.v1".to_string()),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
