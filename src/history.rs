//! Emotional state history
//!
//! Bounded, time-ordered retention of emotional states with windowed
//! averaging. The store is shared between the cycle that appends and any
//! number of readers, so every operation takes the lock for its full
//! duration and readers get an owned snapshot.

use crate::buffer::BoundedBuffer;
use crate::types::EmotionalState;
use chrono::{DateTime, Duration, Utc};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of retained states
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default averaging window (5 minutes)
pub const DEFAULT_AVERAGE_WINDOW_MS: i64 = 300_000;

/// Thread-safe ring buffer of emotional states
#[derive(Debug)]
pub struct HistoryStore {
    states: RwLock<BoundedBuffer<EmotionalState>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    /// Create a store retaining at most `capacity` states
    pub fn new(capacity: usize) -> Self {
        Self {
            states: RwLock::new(BoundedBuffer::new(capacity)),
        }
    }

    /// Append a state, evicting the oldest if the store is full
    pub fn append(&self, state: EmotionalState) {
        self.write().push(state);
    }

    /// Append a state and return the entry that was newest before it.
    ///
    /// Both happen under one write lock, so concurrent appends each see a
    /// distinct predecessor.
    pub fn append_with_previous(&self, state: EmotionalState) -> Option<EmotionalState> {
        let mut states = self.write();
        let previous = states.back().cloned();
        states.push(state);
        previous
    }

    /// Most recent `limit` states (all when `None`) in chronological order
    pub fn get_recent(&self, limit: Option<usize>) -> Vec<EmotionalState> {
        self.read().recent(limit)
    }

    /// Newest stored state
    pub fn latest(&self) -> Option<EmotionalState> {
        self.read().back().cloned()
    }

    /// Per-dimension mean over states younger than `window`, measured from now
    pub fn get_average_state(&self, window: Duration) -> Option<EmotionalState> {
        self.average_state_at(window, Utc::now())
    }

    /// Per-dimension mean over states whose age at `now` is below `window`
    pub fn average_state_at(&self, window: Duration, now: DateTime<Utc>) -> Option<EmotionalState> {
        let states = self.read();
        let mut sum = Sums::default();

        for state in states.iter().filter(|s| now - s.timestamp < window) {
            sum.add(state);
        }

        sum.mean(now)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    fn read(&self) -> RwLockReadGuard<'_, BoundedBuffer<EmotionalState>> {
        self.states.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BoundedBuffer<EmotionalState>> {
        self.states.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Sums {
    focus: f64,
    stress: f64,
    confusion: f64,
    flow: f64,
    valence: f64,
    arousal: f64,
    count: usize,
}

impl Sums {
    fn add(&mut self, s: &EmotionalState) {
        self.focus += s.focus;
        self.stress += s.stress;
        self.confusion += s.confusion;
        self.flow += s.flow;
        self.valence += s.valence;
        self.arousal += s.arousal;
        self.count += 1;
    }

    fn mean(self, at: DateTime<Utc>) -> Option<EmotionalState> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;

        Some(EmotionalState {
            timestamp: at,
            focus: self.focus / n,
            stress: self.stress / n,
            confusion: self.confusion / n,
            flow: self.flow / n,
            valence: self.valence / n,
            arousal: self.arousal / n,
            context: None,
        })
    }
}
