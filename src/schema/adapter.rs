//! Parsing helpers for empath.cycle.v1 streams

use crate::error::EngineError;
use crate::schema::cycle_input::CycleInput;
use crate::sources::SourceTransform;
use crate::types::SourceReading;
use serde::Serialize;

/// Adapter for batches of cycle inputs
pub struct CycleInputAdapter;

impl CycleInputAdapter {
    /// Parse a JSON string containing an array of cycle inputs
    pub fn parse_array(json: &str) -> Result<Vec<CycleInput>, EngineError> {
        let inputs: Vec<CycleInput> = serde_json::from_str(json)?;
        Ok(inputs)
    }

    /// Parse NDJSON (one cycle input per line, blank lines ignored)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<CycleInput>, EngineError> {
        let mut inputs = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<CycleInput>(trimmed) {
                Ok(input) => inputs.push(input),
                Err(e) => {
                    return Err(EngineError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(inputs)
    }

    /// Check schema versions and reading shapes without running fusion
    pub fn validate_inputs(inputs: &[CycleInput]) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        for (index, input) in inputs.iter().enumerate() {
            if let Err(e) = input.validate() {
                results.push(ValidationResult {
                    index,
                    reading_index: None,
                    error: e.to_string(),
                });
                continue;
            }

            for (reading_index, value) in input.readings.iter().enumerate() {
                let outcome = serde_json::from_value::<SourceReading>(value.clone())
                    .map_err(EngineError::from)
                    .and_then(|reading| reading.validate());

                if let Err(e) = outcome {
                    results.push(ValidationResult {
                        index,
                        reading_index: Some(reading_index),
                        error: e.to_string(),
                    });
                }
            }
        }

        results
    }
}

/// Problem found in one cycle input or one of its readings
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Cycle position in the batch
    pub index: usize,
    /// Reading position within the cycle, when the problem is reading-level
    pub reading_index: Option<usize>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const NDJSON: &str = r#"
{"readings":[{"source":"wearable","confidence":0.6,"heart_rate":82.0}]}

{"context":"meeting","readings":[]}
"#;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let inputs = CycleInputAdapter::parse_ndjson(NDJSON).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].context.as_deref(), Some("meeting"));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let err = CycleInputAdapter::parse_ndjson("{}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let inputs = CycleInputAdapter::parse_array(r#"[{}, {"readings": []}]"#).unwrap();
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn test_validate_inputs() {
        let inputs = CycleInputAdapter::parse_ndjson(
            r#"{"readings":[{"source":"vocal","confidence":1.4,"pitch":1.0,"energy":1.0,"speech_rate":1.0,"emotion":"calm"}]}
{"schema_version":"other.v2"}
{"readings":[{"source":"wearable","confidence":0.5}]}"#,
        )
        .unwrap();

        let results = CycleInputAdapter::validate_inputs(&inputs);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[0].reading_index, Some(0));
        assert!(results[0].error.contains("confidence"));
        assert_eq!(results[1].index, 1);
        assert!(results[1].reading_index.is_none());
    }
}
