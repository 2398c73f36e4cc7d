//! pammtrader: single-instrument PAMM signal trading engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], async drivers in [`runtime`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod runtime;
pub mod cli;
