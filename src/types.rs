//! Core types for the Empath engine
//!
//! This module defines the data structures that flow through each stage of a
//! cycle: source readings, the fused cognitive model, the stored emotional
//! state, and the action events handed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Detector category a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Facial,
    Vocal,
    Behavioral,
    Wearable,
}

impl SourceKind {
    /// All kinds in canonical fusion order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Facial,
        SourceKind::Vocal,
        SourceKind::Behavioral,
        SourceKind::Wearable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Facial => "facial",
            SourceKind::Vocal => "vocal",
            SourceKind::Behavioral => "behavioral",
            SourceKind::Wearable => "wearable",
        }
    }
}

/// Per-class facial expression probabilities (0-1)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacialEmotions {
    pub neutral: f64,
    pub happy: f64,
    pub sad: f64,
    pub angry: f64,
    pub fearful: f64,
    pub disgusted: f64,
    pub surprised: f64,
}

/// Normalized gaze position in the camera frame (0-1 on each axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaze {
    pub x: f64,
    pub y: f64,
}

/// Facial expression reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialReading {
    pub confidence: f64,
    pub emotions: FacialEmotions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaze: Option<Gaze>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Vocal emotion classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocalEmotion {
    Calm,
    Excited,
    Stressed,
    Neutral,
}

/// Voice prosody reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocalReading {
    pub confidence: f64,
    /// Fundamental frequency (Hz)
    pub pitch: f64,
    /// Signal energy (0-1)
    pub energy: f64,
    /// Syllables per second
    pub speech_rate: f64,
    pub emotion: VocalEmotion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Keyboard and pointer behavior over the last collection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralReading {
    pub confidence: f64,
    /// Words per minute
    pub typing_speed: f64,
    /// Share of corrective keystrokes (0-1)
    pub error_rate: f64,
    /// Pointer movements per minute
    pub mouse_movements: f64,
    /// Clicks per minute
    pub click_rate: f64,
    /// Average pause between keystrokes (ms)
    pub pause_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Three-axis accelerometer sample (g)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Wearable physiology reading. Every metric is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WearableReading {
    pub confidence: f64,
    /// Heart rate (bpm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    /// Heart rate variability (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate_variability: Option<f64>,
    /// Skin temperature (celsius)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<Acceleration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// One source's confidence-scored reading for a single cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceReading {
    Facial(FacialReading),
    Vocal(VocalReading),
    Behavioral(BehavioralReading),
    Wearable(WearableReading),
}

impl SourceReading {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceReading::Facial(_) => SourceKind::Facial,
            SourceReading::Vocal(_) => SourceKind::Vocal,
            SourceReading::Behavioral(_) => SourceKind::Behavioral,
            SourceReading::Wearable(_) => SourceKind::Wearable,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            SourceReading::Facial(r) => r.confidence,
            SourceReading::Vocal(r) => r.confidence,
            SourceReading::Behavioral(r) => r.confidence,
            SourceReading::Wearable(r) => r.confidence,
        }
    }
}

/// Fused estimate of the four primary dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveStateModel {
    pub focus: f64,
    pub stress: f64,
    pub confusion: f64,
    pub flow: f64,
    /// Aggregate confidence (0-1)
    pub confidence: f64,
    /// Contributing sources in canonical order
    pub sources: Vec<SourceKind>,
}

/// Public state estimate retained by the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub timestamp: DateTime<Utc>,
    pub focus: f64,
    pub stress: f64,
    pub confusion: f64,
    pub flow: f64,
    /// Negative to positive emotion (-1 to 1)
    pub valence: f64,
    /// Calm to excited (0-1)
    pub arousal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Kind of environment change an action requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    UiTheme,
    Notification,
    DeepWork,
    Assist,
    Suggestion,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::UiTheme => "ui-theme",
            ActionType::Notification => "notification",
            ActionType::DeepWork => "deep-work",
            ActionType::Assist => "assist",
            ActionType::Suggestion => "suggestion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
}

/// Orchestration rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    StressRelief,
    DeepWork,
    ConfusionAssist,
    FocusRestoration,
    ThemeAdaptation,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::StressRelief => "stress-relief",
            RuleId::DeepWork => "deep-work",
            RuleId::ConfusionAssist => "confusion-assist",
            RuleId::FocusRestoration => "focus-restoration",
            RuleId::ThemeAdaptation => "theme-adaptation",
        }
    }
}

/// UI theme selected by the theme-adaptation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Calm,
    Energetic,
    Neutral,
}

/// Prioritized action emitted by the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub rule: RuleId,
    pub payload: serde_json::Value,
    /// Rule name and triggering metric, e.g. `stress-relief:stress=0.82`
    pub triggered_by: String,
    pub timestamp: DateTime<Utc>,
}
