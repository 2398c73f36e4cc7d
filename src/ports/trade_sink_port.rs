//! Trade persistence port trait.

use crate::domain::error::EngineError;
use crate::domain::trade::Trade;

pub trait TradeSink {
    fn record(&self, trade: &Trade) -> Result<(), EngineError>;
}
