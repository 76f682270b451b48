//! Engine orchestration
//!
//! This module provides the public API for Empath. An [`EmpathEngine`] owns one
//! history store, one rule engine and one dispatcher, and runs the full cycle
//! from a reading set to dispatched actions.
//!
//! Cycle stages:
//! 1. FusionEngine - Fuse accepted readings into a cognitive model
//! 2. AffectMapper - Derive valence and arousal
//! 3. HistoryStore - Append the state, capturing the previous one
//! 4. RuleEngine - Evaluate thresholds against the new state
//! 5. ActionDispatcher - Record and deliver the resulting actions
//!
//! Stages 2 to 5 run under a sequencing lock so overlapping cycles stamp,
//! append, evaluate and dispatch in a single order. Fusion runs outside it.
//!
//! The default engine delivers actions through a bounded queue drained by a
//! worker thread, so subscribers never run inside a cycle. With inline
//! delivery they do, and a callback that starts another cycle on the same
//! engine runs it nested (with a warning) instead of deadlocking.

use crate::affect::AffectMapper;
use crate::config::EngineConfig;
use crate::dispatcher::{ActionDispatcher, SubscriberError, Subscription, SubscriptionId};
use crate::error::EngineError;
use crate::fusion::{FusionEngine, RejectedReading};
use crate::history::HistoryStore;
use crate::rules::{RuleEngine, ThresholdName, Thresholds};
use crate::schema::CycleInput;
use crate::types::{ActionEvent, CognitiveStateModel, EmotionalState, SourceReading};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Everything one cycle produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub model: CognitiveStateModel,
    pub state: EmotionalState,
    pub actions: Vec<ActionEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedReading>,
}

/// Stateful fusion and orchestration engine
#[derive(Debug)]
pub struct EmpathEngine {
    history: HistoryStore,
    rules: RuleEngine,
    dispatcher: ActionDispatcher,
    sequencer: Sequencer,
}

impl Default for EmpathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EmpathEngine {
    /// Create an engine with default settings and queued delivery
    pub fn new() -> Self {
        let config = EngineConfig::default();
        match Self::with_config(config.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                error!("Falling back to inline delivery: {}", e);
                Self {
                    history: HistoryStore::new(config.history_capacity),
                    rules: RuleEngine::with_thresholds(config.thresholds),
                    dispatcher: ActionDispatcher::new(config.action_history_capacity),
                    sequencer: Sequencer::default(),
                }
            }
        }
    }

    /// Create an engine from a validated configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let dispatcher = ActionDispatcher::with_delivery(
            config.action_history_capacity,
            config.delivery,
            std::time::Duration::from_millis(config.subscriber_budget_ms),
        )?;

        Ok(Self {
            history: HistoryStore::new(config.history_capacity),
            rules: RuleEngine::with_thresholds(config.thresholds),
            dispatcher,
            sequencer: Sequencer::default(),
        })
    }

    /// Create an engine from a JSON configuration document
    pub fn from_config_json(json: &str) -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::from_json(json)?)
    }

    /// Fuse readings without touching history or dispatching anything
    pub fn compute_state(&self, readings: &[SourceReading]) -> CognitiveStateModel {
        FusionEngine::compute_state(readings)
    }

    /// Map a model to its public state and append it to history
    pub fn to_emotional_state(
        &self,
        model: &CognitiveStateModel,
        context: Option<String>,
    ) -> EmotionalState {
        let _guard = self.sequencer.enter();
        let state = AffectMapper::map(model, context, Utc::now());
        self.history.append(state.clone());
        state
    }

    /// Evaluate rules against `state`, then record and dispatch the actions
    pub fn orchestrate(
        &self,
        state: &EmotionalState,
        previous: Option<&EmotionalState>,
    ) -> Vec<ActionEvent> {
        let _guard = self.sequencer.enter();
        self.evaluate_and_publish(state, previous)
    }

    /// Run a full cycle stamped with the current time.
    ///
    /// The time is taken inside the sequencing lock, so overlapping cycles
    /// land in history in timestamp order.
    pub fn process_cycle(&self, readings: &[SourceReading], context: Option<String>) -> CycleOutcome {
        self.run_cycle(readings, context, None)
    }

    /// Run a full cycle stamped with `at`.
    ///
    /// History keeps arrival order. A stamp older than the newest stored
    /// state is accepted and logged.
    pub fn process_cycle_at(
        &self,
        readings: &[SourceReading],
        context: Option<String>,
        at: DateTime<Utc>,
    ) -> CycleOutcome {
        self.run_cycle(readings, context, Some(at))
    }

    /// Run a full cycle from a schema input.
    ///
    /// Readings that fail to decode are reported alongside fusion rejections;
    /// only an unsupported schema version fails the call. Inputs without a
    /// timestamp are stamped like [`EmpathEngine::process_cycle`].
    pub fn process_input(&self, input: &CycleInput) -> Result<CycleOutcome, EngineError> {
        input.validate()?;

        let (readings, mut rejected) = input.decode_readings();

        let mut outcome = self.run_cycle(&readings, input.context.clone(), input.timestamp);
        rejected.append(&mut outcome.rejected);
        outcome.rejected = rejected;

        Ok(outcome)
    }

    /// Most recent `limit` states (all when `None`) in chronological order
    pub fn get_recent(&self, limit: Option<usize>) -> Vec<EmotionalState> {
        self.history.get_recent(limit)
    }

    /// Mean state over entries younger than `window`
    pub fn get_average_state(&self, window: Duration) -> Option<EmotionalState> {
        self.history.get_average_state(window)
    }

    /// Mean state over entries younger than `window`, measured from `now`
    pub fn average_state_at(&self, window: Duration, now: DateTime<Utc>) -> Option<EmotionalState> {
        self.history.average_state_at(window, now)
    }

    pub fn clear_history(&self) {
        let _guard = self.sequencer.enter();
        self.history.clear();
    }

    /// Register a callback for every subsequently dispatched action.
    ///
    /// With inline delivery, callbacks run while the cycle holds the
    /// sequencing lock. A callback that starts another cycle on this engine
    /// runs it nested on the same thread. With queued delivery, callbacks
    /// run on the worker thread; one that starts a cycle while the queue is
    /// full deadlocks the engine, because that cycle waits on the queue the
    /// callback is meant to drain.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ActionEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Most recent `limit` actions (all when `None`) in chronological order
    pub fn get_action_history(&self, limit: Option<usize>) -> Vec<ActionEvent> {
        self.dispatcher.get_action_history(limit)
    }

    /// Set a rule threshold. Out-of-range values are ignored.
    pub fn update_threshold(&self, name: ThresholdName, value: f64) -> bool {
        self.rules.update_threshold(name, value)
    }

    /// Set a rule threshold by name, e.g. `"stress"` or `"deep_work"`
    pub fn update_threshold_by_name(&self, name: &str, value: f64) -> Result<bool, EngineError> {
        let name: ThresholdName = name.parse()?;
        Ok(self.update_threshold(name, value))
    }

    pub fn get_thresholds(&self) -> Thresholds {
        self.rules.get_thresholds()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    fn evaluate_and_publish(
        &self,
        state: &EmotionalState,
        previous: Option<&EmotionalState>,
    ) -> Vec<ActionEvent> {
        let actions = self.rules.orchestrate(state, previous);
        self.dispatcher.publish(&actions);
        actions
    }

    fn run_cycle(
        &self,
        readings: &[SourceReading],
        context: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> CycleOutcome {
        let report = FusionEngine::fuse(readings);

        let (state, actions) = {
            let _guard = self.sequencer.enter();
            let state = AffectMapper::map(&report.model, context, at.unwrap_or_else(Utc::now));
            let previous = self.history.append_with_previous(state.clone());

            if let Some(prev) = &previous {
                if prev.timestamp > state.timestamp {
                    warn!(
                        "Cycle stamped {} is older than the newest stored state ({})",
                        state.timestamp, prev.timestamp
                    );
                }
            }

            let actions = self.evaluate_and_publish(&state, previous.as_ref());
            (state, actions)
        };

        debug!(
            "Cycle at {}: {} source(s), {} action(s)",
            state.timestamp,
            report.model.sources.len(),
            actions.len()
        );

        CycleOutcome {
            model: report.model,
            state,
            actions,
            rejected: report.rejected,
        }
    }
}

/// Lock over the write half of a cycle that knows which thread holds it
#[derive(Debug, Default)]
struct Sequencer {
    lock: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
}

impl Sequencer {
    fn enter(&self) -> SequenceGuard<'_> {
        let me = thread::current().id();

        if *self.holder() == Some(me) {
            warn!("Engine cycle started from a subscriber callback, running it nested");
            return SequenceGuard {
                holder: None,
                _lock: None,
            };
        }

        let lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.holder() = Some(me);

        SequenceGuard {
            holder: Some(&self.holder),
            _lock: Some(lock),
        }
    }

    fn holder(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the sequencing lock; a nested entry holds nothing
struct SequenceGuard<'a> {
    holder: Option<&'a Mutex<Option<ThreadId>>>,
    _lock: Option<MutexGuard<'a, ()>>,
}

impl Drop for SequenceGuard<'_> {
    fn drop(&mut self) {
        if let Some(holder) = self.holder {
            *holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}
