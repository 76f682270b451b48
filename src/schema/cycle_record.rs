//! Serialized output of one engine cycle
//!
//! Records carry producer metadata so downstream consumers can tell which
//! engine build and which engine instance emitted them.

use crate::engine::CycleOutcome;
use crate::error::EngineError;
use crate::fusion::RejectedReading;
use crate::schema::cycle_input::SCHEMA_VERSION;
use crate::types::{ActionEvent, CognitiveStateModel, EmotionalState};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine build and instance that produced a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub schema_version: String,
    pub producer: RecordProducer,
    pub computed_at: DateTime<Utc>,
    pub model: CognitiveStateModel,
    pub state: EmotionalState,
    pub actions: Vec<ActionEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedReading>,
}

/// Stamps cycle outcomes with a stable instance id
#[derive(Debug, Clone)]
pub struct CycleRecordEncoder {
    instance_id: String,
}

impl Default for CycleRecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleRecordEncoder {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, outcome: CycleOutcome) -> CycleRecord {
        CycleRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: Utc::now(),
            model: outcome.model,
            state: outcome.state,
            actions: outcome.actions,
            rejected: outcome.rejected,
        }
    }

    pub fn encode_to_json(&self, outcome: CycleOutcome) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.encode(outcome))?)
    }
}
