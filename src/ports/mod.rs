//! Port traits the engine depends on.

pub mod clock_port;
pub mod config_port;
pub mod market_data_port;
pub mod trade_sink_port;
