//! empath.cycle.v1 schema
//!
//! This module defines the JSON shapes external collectors use to hand a
//! cycle's readings to the engine, and the record the engine emits back.

mod adapter;
mod cycle_input;
mod cycle_record;

pub use adapter::*;
pub use cycle_input::*;
pub use cycle_record::*;
