//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_trade_sink;
pub mod file_config_adapter;
pub mod system_clock;
