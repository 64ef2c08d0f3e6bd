//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events named by the constants in [`events`] and never
//! installs a global subscriber; binaries and tests do that once at their process
//! boundary.

pub mod events;
pub mod fields;
