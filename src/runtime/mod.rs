//! Async drivers for the engine.

pub mod scheduler;
