//! Orchestration rules
//!
//! Evaluates the newest emotional state (and, for focus restoration, the one
//! before it) against a fixed rule table. Every rule fires at most once per
//! cycle and rules are evaluated independently, in table order:
//!
//! | Rule              | Condition                                   | Action                  |
//! |-------------------|---------------------------------------------|-------------------------|
//! | stress-relief     | stress > high_stress                        | notification / high     |
//! | deep-work         | focus > deep_work and flow > 0.6            | deep-work / high        |
//! | confusion-assist  | confusion > high_confusion                  | assist / medium         |
//! | focus-restoration | focus < low_focus and previous focus > 0.5  | suggestion / low        |
//! | theme-adaptation  | always                                      | ui-theme / low          |

use crate::error::EngineError;
use crate::types::{ActionEvent, ActionPriority, ActionType, EmotionalState, RuleId, Theme};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Flow level deep-work mode additionally requires
pub const DEEP_WORK_FLOW_GATE: f64 = 0.6;

/// Previous focus above which a drop counts as losing focus
pub const FOCUS_DROP_PRIOR: f64 = 0.5;

/// Stress above which the calm theme is chosen
pub const CALM_THEME_STRESS: f64 = 0.6;

/// Arousal above which (with positive valence) the energetic theme is chosen
pub const ENERGETIC_THEME_AROUSAL: f64 = 0.7;

/// Suggested deep-work block (30 minutes)
const DEEP_WORK_DURATION_MS: u64 = 1_800_000;

/// Stress-relief notification display time
const NOTIFICATION_DURATION_MS: u64 = 5_000;

/// Runtime-adjustable rule thresholds (all 0-1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub high_stress: f64,
    pub deep_work: f64,
    pub high_confusion: f64,
    pub low_focus: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_stress: 0.7,
            deep_work: 0.75,
            high_confusion: 0.6,
            low_focus: 0.3,
        }
    }
}

impl Thresholds {
    pub fn get(&self, name: ThresholdName) -> f64 {
        match name {
            ThresholdName::HighStress => self.high_stress,
            ThresholdName::DeepWork => self.deep_work,
            ThresholdName::HighConfusion => self.high_confusion,
            ThresholdName::LowFocus => self.low_focus,
        }
    }

    fn slot(&mut self, name: ThresholdName) -> &mut f64 {
        match name {
            ThresholdName::HighStress => &mut self.high_stress,
            ThresholdName::DeepWork => &mut self.deep_work,
            ThresholdName::HighConfusion => &mut self.high_confusion,
            ThresholdName::LowFocus => &mut self.low_focus,
        }
    }

    /// First threshold outside [0, 1], if any
    pub fn out_of_range(&self) -> Option<(ThresholdName, f64)> {
        ThresholdName::ALL
            .iter()
            .map(|&name| (name, self.get(name)))
            .find(|&(_, value)| !is_unit(value))
    }
}

/// Names accepted by [`RuleEngine::update_threshold`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdName {
    HighStress,
    DeepWork,
    HighConfusion,
    LowFocus,
}

impl ThresholdName {
    pub const ALL: [ThresholdName; 4] = [
        ThresholdName::HighStress,
        ThresholdName::DeepWork,
        ThresholdName::HighConfusion,
        ThresholdName::LowFocus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdName::HighStress => "high_stress",
            ThresholdName::DeepWork => "deep_work",
            ThresholdName::HighConfusion => "high_confusion",
            ThresholdName::LowFocus => "low_focus",
        }
    }
}

impl FromStr for ThresholdName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stress" | "high_stress" | "highstress" => Ok(ThresholdName::HighStress),
            "deep_work" | "deepwork" => Ok(ThresholdName::DeepWork),
            "confusion" | "high_confusion" | "highconfusion" => Ok(ThresholdName::HighConfusion),
            "low_focus" | "lowfocus" => Ok(ThresholdName::LowFocus),
            _ => Err(EngineError::UnknownThreshold(s.to_string())),
        }
    }
}

fn is_unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Threshold-based rule evaluator
#[derive(Debug, Default)]
pub struct RuleEngine {
    thresholds: RwLock<Thresholds>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds: RwLock::new(thresholds),
        }
    }

    /// Evaluate every rule against `state`, returning actions in table order
    pub fn orchestrate(
        &self,
        state: &EmotionalState,
        previous: Option<&EmotionalState>,
    ) -> Vec<ActionEvent> {
        let t = self.get_thresholds();
        let mut actions = Vec::new();

        if state.stress > t.high_stress {
            actions.push(stress_relief(state));
        }

        if state.focus > t.deep_work && state.flow > DEEP_WORK_FLOW_GATE {
            actions.push(deep_work(state));
        }

        if state.confusion > t.high_confusion {
            actions.push(confusion_assist(state));
        }

        if let Some(prev) = previous {
            if state.focus < t.low_focus && prev.focus > FOCUS_DROP_PRIOR {
                actions.push(focus_restoration(state, prev));
            }
        }

        actions.push(theme_adaptation(state));
        actions
    }

    /// Set a threshold. Values outside [0, 1] are ignored and `false` is returned.
    pub fn update_threshold(&self, name: ThresholdName, value: f64) -> bool {
        if !is_unit(value) {
            warn!(
                "Ignoring {} threshold update: {} is outside [0, 1]",
                name.as_str(),
                value
            );
            return false;
        }

        let mut thresholds = self
            .thresholds
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *thresholds.slot(name) = value;
        true
    }

    /// Snapshot of the current thresholds
    pub fn get_thresholds(&self) -> Thresholds {
        *self.thresholds.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn action(
    rule: RuleId,
    action_type: ActionType,
    priority: ActionPriority,
    payload: serde_json::Value,
    metric: &str,
    value: f64,
    state: &EmotionalState,
) -> ActionEvent {
    ActionEvent {
        id: Uuid::new_v4(),
        action_type,
        priority,
        rule,
        payload,
        triggered_by: format!("{}:{}={:.2}", rule.as_str(), metric, value),
        timestamp: state.timestamp,
    }
}

fn stress_relief(state: &EmotionalState) -> ActionEvent {
    action(
        RuleId::StressRelief,
        ActionType::Notification,
        ActionPriority::High,
        json!({
            "title": "High Stress Detected",
            "message": "Consider taking a short break. Would you like a breathing exercise?",
            "actions": ["Take Break", "Continue Working", "Dismiss"],
            "duration_ms": NOTIFICATION_DURATION_MS,
        }),
        "stress",
        state.stress,
        state,
    )
}

fn deep_work(state: &EmotionalState) -> ActionEvent {
    action(
        RuleId::DeepWork,
        ActionType::DeepWork,
        ActionPriority::High,
        json!({
            "mode": "enable",
            "silence_notifications": true,
            "minimize_distractions": true,
            "estimated_duration_ms": DEEP_WORK_DURATION_MS,
        }),
        "flow",
        state.flow,
        state,
    )
}

fn confusion_assist(state: &EmotionalState) -> ActionEvent {
    action(
        RuleId::ConfusionAssist,
        ActionType::Assist,
        ActionPriority::Medium,
        json!({
            "title": "Need Help?",
            "message": "You might be stuck. Would you like to:",
            "suggestions": [
                "Search documentation",
                "Simplify current task",
                "Show examples",
                "Take a break",
            ],
        }),
        "confusion",
        state.confusion,
        state,
    )
}

fn focus_restoration(state: &EmotionalState, previous: &EmotionalState) -> ActionEvent {
    action(
        RuleId::FocusRestoration,
        ActionType::Suggestion,
        ActionPriority::Low,
        json!({
            "message": "Your focus seems to have drifted. Quick tips:",
            "tips": [
                "Close unnecessary tabs",
                "Review your current goal",
                "Take a 2-minute walk",
                "Adjust lighting/environment",
            ],
            "previous_focus": previous.focus,
        }),
        "focus",
        state.focus,
        state,
    )
}

fn theme_adaptation(state: &EmotionalState) -> ActionEvent {
    let (theme, metric, value) = if state.stress > CALM_THEME_STRESS {
        (Theme::Calm, "stress", state.stress)
    } else if state.arousal > ENERGETIC_THEME_AROUSAL && state.valence > 0.0 {
        (Theme::Energetic, "arousal", state.arousal)
    } else {
        (Theme::Neutral, "arousal", state.arousal)
    };

    let payload = match theme {
        Theme::Calm => json!({
            "theme": theme,
            "reduce_animations": true,
            "low_contrast": true,
            "warm_colors": true,
            "minimize_clutter": true,
        }),
        Theme::Energetic => json!({
            "theme": theme,
            "vibrant_colors": true,
            "smooth_animations": true,
        }),
        Theme::Neutral => json!({ "theme": theme }),
    };

    action(
        RuleId::ThemeAdaptation,
        ActionType::UiTheme,
        ActionPriority::Low,
        payload,
        metric,
        value,
        state,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn state(focus: f64, stress: f64, confusion: f64, flow: f64) -> EmotionalState {
        let valence = 2.0 * (0.5 * flow + 0.3 * (1.0 - stress) + 0.2 * (1.0 - confusion)) - 1.0;
        EmotionalState {
            timestamp: Utc::now(),
            focus,
            stress,
            confusion,
            flow,
            valence,
            arousal: 0.4 * focus + 0.6 * stress,
            context: None,
        }
    }

    fn types(actions: &[ActionEvent]) -> Vec<ActionType> {
        actions.iter().map(|a| a.action_type).collect()
    }

    #[test]
    fn test_deep_work_and_neutral_theme() {
        let engine = RuleEngine::new();
        let actions = engine.orchestrate(&state(1.0, 0.375, 0.38, 1.0), None);

        assert_eq!(types(&actions), vec![ActionType::DeepWork, ActionType::UiTheme]);
        assert_eq!(actions[0].priority, ActionPriority::High);
        assert_eq!(actions[0].triggered_by, "deep-work:flow=1.00");
        assert_eq!(actions[1].payload["theme"], "neutral");
    }

    #[test]
    fn test_baseline_only_theme() {
        let engine = RuleEngine::new();
        let actions = engine.orchestrate(&state(0.5, 0.3, 0.2, 0.4), None);

        assert_eq!(types(&actions), vec![ActionType::UiTheme]);
        assert_eq!(actions[0].rule, RuleId::ThemeAdaptation);
        assert_eq!(actions[0].payload["theme"], "neutral");
    }

    #[test]
    fn test_stress_and_confusion() {
        let engine = RuleEngine::new();
        let actions = engine.orchestrate(&state(0.4, 0.85, 0.7, 0.2), None);

        assert_eq!(
            types(&actions),
            vec![ActionType::Notification, ActionType::Assist, ActionType::UiTheme]
        );
        assert_eq!(actions[0].triggered_by, "stress-relief:stress=0.85");
        assert_eq!(actions[1].priority, ActionPriority::Medium);
        assert_eq!(actions[2].payload["theme"], "calm");
        assert_eq!(actions[2].payload["warm_colors"], true);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let engine = RuleEngine::new();
        let actions = engine.orchestrate(&state(0.75, 0.7, 0.6, 0.9), None);
        assert_eq!(types(&actions), vec![ActionType::UiTheme]);
    }

    #[test]
    fn test_deep_work_needs_flow() {
        let engine = RuleEngine::new();
        let actions = engine.orchestrate(&state(0.9, 0.1, 0.1, 0.6), None);
        assert_eq!(types(&actions), vec![ActionType::UiTheme]);
    }

    #[test]
    fn test_focus_restoration_edge() {
        let engine = RuleEngine::new();
        let focused = state(0.6, 0.3, 0.2, 0.4);
        let drifted = state(0.2, 0.3, 0.2, 0.4);

        let first = engine.orchestrate(&drifted, Some(&focused));
        assert_eq!(types(&first), vec![ActionType::Suggestion, ActionType::UiTheme]);
        assert_eq!(first[0].triggered_by, "focus-restoration:focus=0.20");
        assert_eq!(first[0].payload["previous_focus"], 0.6);

        // still low: no repeat
        let second = engine.orchestrate(&state(0.1, 0.3, 0.2, 0.4), Some(&drifted));
        assert_eq!(types(&second), vec![ActionType::UiTheme]);

        // no previous state: no edge
        let cold = engine.orchestrate(&drifted, None);
        assert_eq!(types(&cold), vec![ActionType::UiTheme]);
    }

    #[test]
    fn test_energetic_theme() {
        let engine = RuleEngine::new();
        let s = EmotionalState {
            arousal: 0.8,
            valence: 0.2,
            ..state(0.9, 0.5, 0.1, 0.5)
        };

        let actions = engine.orchestrate(&s, None);
        let theme = actions.last().unwrap();
        assert_eq!(theme.payload["theme"], "energetic");
        assert_eq!(theme.triggered_by, "theme-adaptation:arousal=0.80");
    }

    #[test]
    fn test_update_threshold() {
        let engine = RuleEngine::new();

        assert!(engine.update_threshold(ThresholdName::HighStress, 0.5));
        assert!(!engine.update_threshold(ThresholdName::HighStress, 1.5));
        assert!(!engine.update_threshold(ThresholdName::DeepWork, -0.1));
        assert!(!engine.update_threshold(ThresholdName::DeepWork, f64::NAN));

        let t = engine.get_thresholds();
        assert_eq!(t.high_stress, 0.5);
        assert_eq!(t.deep_work, 0.75);

        let actions = engine.orchestrate(&state(0.4, 0.55, 0.2, 0.4), None);
        assert_eq!(actions[0].action_type, ActionType::Notification);
    }

    #[test]
    fn test_threshold_names_parse() {
        assert_eq!("stress".parse::<ThresholdName>().unwrap(), ThresholdName::HighStress);
        assert_eq!("deep-work".parse::<ThresholdName>().unwrap(), ThresholdName::DeepWork);
        assert_eq!("highConfusion".parse::<ThresholdName>().unwrap(), ThresholdName::HighConfusion);
        assert_eq!("LOW_FOCUS".parse::<ThresholdName>().unwrap(), ThresholdName::LowFocus);
        assert!("volume".parse::<ThresholdName>().is_err());
    }

    #[test]
    fn test_bare_focus_is_not_a_threshold_name() {
        assert!("focus".parse::<ThresholdName>().is_err());
        assert!("deep_work".parse::<ThresholdName>().is_ok());
        assert_eq!("low_focus".parse::<ThresholdName>().unwrap(), ThresholdName::LowFocus);
    }

    #[test]
    fn test_out_of_range_detection() {
        let t = Thresholds {
            low_focus: 1.2,
            ..Default::default()
        };
        assert_eq!(t.out_of_range(), Some((ThresholdName::LowFocus, 1.2)));
        assert!(Thresholds::default().out_of_range().is_none());
    }

    #[test]
    fn test_action_ids_unique() {
        let engine = RuleEngine::new();
        let s = state(0.9, 0.8, 0.7, 0.9);
        let actions = engine.orchestrate(&s, None);
        assert_eq!(actions.len(), 4);
        assert_ne!(actions[0].id, actions[1].id);
    }
}
