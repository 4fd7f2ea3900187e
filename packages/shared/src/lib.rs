//! Utilities shared by the Keyroom packages.
//!
//! - `logger`: tracing subscriber setup
//! - `time`: wall clock abstraction used for note timing and clock sync

pub mod logger;
pub mod time;
