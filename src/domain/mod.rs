//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod signal;
pub mod position;
pub mod trade;
pub mod risk;
pub mod engine;
pub mod config_validation;
pub mod error;
