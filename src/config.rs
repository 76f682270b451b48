//! Engine configuration
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration.

use crate::dispatcher::{DeliveryMode, DEFAULT_ACTION_HISTORY_CAPACITY, DEFAULT_SUBSCRIBER_BUDGET_MS};
use crate::error::EngineError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::rules::Thresholds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum retained emotional states
    pub history_capacity: usize,
    /// Maximum retained action events
    pub action_history_capacity: usize,
    /// Initial rule thresholds
    pub thresholds: Thresholds,
    /// How actions reach subscribers (queued unless set to inline)
    pub delivery: DeliveryMode,
    /// Callback duration above which a slow-subscriber warning is logged
    pub subscriber_budget_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            action_history_capacity: DEFAULT_ACTION_HISTORY_CAPACITY,
            thresholds: Thresholds::default(),
            delivery: DeliveryMode::default(),
            subscriber_budget_ms: DEFAULT_SUBSCRIBER_BUDGET_MS,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.history_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "history_capacity must be positive".to_string(),
            ));
        }

        if self.action_history_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "action_history_capacity must be positive".to_string(),
            ));
        }

        if let Some((name, value)) = self.thresholds.out_of_range() {
            return Err(EngineError::InvalidConfig(format!(
                "threshold {} = {} is outside [0, 1]",
                name.as_str(),
                value
            )));
        }

        if let DeliveryMode::Queued { capacity: 0 } = self.delivery {
            return Err(EngineError::InvalidConfig(
                "queued delivery capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.action_history_capacity, 100);
        assert!(matches!(config.delivery, DeliveryMode::Queued { .. }));
    }

    #[test]
    fn test_inline_delivery_opt_in() {
        let config = EngineConfig::from_json(r#"{ "delivery": { "mode": "inline" } }"#).unwrap();
        assert_eq!(config.delivery, DeliveryMode::Inline);
    }

    #[test]
    fn test_partial_thresholds() {
        let config =
            EngineConfig::from_json(r#"{ "thresholds": { "high_stress": 0.6 }, "history_capacity": 10 }"#)
                .unwrap();

        assert_eq!(config.thresholds.high_stress, 0.6);
        assert_eq!(config.thresholds.deep_work, 0.75);
        assert_eq!(config.history_capacity, 10);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let err = EngineConfig::from_json(r#"{ "thresholds": { "deep_work": 1.5 } }"#).unwrap_err();
        assert!(err.to_string().contains("deep_work"));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(EngineConfig::from_json(r#"{ "history_capacity": 0 }"#).is_err());
        assert!(EngineConfig::from_json(r#"{ "action_history_capacity": 0 }"#).is_err());
        assert!(
            EngineConfig::from_json(r#"{ "delivery": { "mode": "queued", "capacity": 0 } }"#).is_err()
        );
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig {
            delivery: DeliveryMode::Queued { capacity: 16 },
            ..Default::default()
        };
        let loaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }
}
