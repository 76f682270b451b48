//! Empath - On-device fusion and orchestration engine for cognitive state signals
//!
//! Empath turns confidence-scored readings from independent detectors into a
//! single emotional state estimate and the actions that estimate calls for:
//! source transforms → weighted fusion → affect mapping → history → rule
//! evaluation → action dispatch.
//!
//! ## Modules
//!
//! - **Fusion**: Per-source transforms and the confidence-weighted fusion engine
//! - **History**: Bounded, time-windowed store of emotional states
//! - **Orchestration**: Threshold rules and the action dispatcher
//! - **Engine**: Owns one of each and runs full cycles

pub mod affect;
pub mod buffer;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod history;
pub mod rules;
pub mod schema;
pub mod sources;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use dispatcher::{ActionDispatcher, DeliveryMode, SubscriberError, Subscription, SubscriptionId};
pub use engine::{CycleOutcome, EmpathEngine};
pub use error::EngineError;
pub use fusion::{FusionEngine, FusionReport, RejectedReading};
pub use history::HistoryStore;
pub use rules::{RuleEngine, ThresholdName, Thresholds};

// Schema exports
pub use schema::{CycleInput, CycleInputAdapter, CycleRecord, CycleRecordEncoder, SCHEMA_VERSION};

pub use types::{
    ActionEvent, ActionPriority, ActionType, CognitiveStateModel, EmotionalState, SourceKind,
    SourceReading,
};

/// Engine version embedded in every cycle record
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for cycle records
pub const PRODUCER_NAME: &str = "empath-core";
