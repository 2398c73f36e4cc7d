//! Append-only CSV trade log, with optional winners/losers split files.

use crate::domain::error::EngineError;
use crate::domain::trade::Trade;
use crate::ports::trade_sink_port::TradeSink;
use chrono::SecondsFormat;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const TRADES_FILE: &str = "trades.csv";
pub const WINNERS_FILE: &str = "winners.csv";
pub const LOSERS_FILE: &str = "losers.csv";

pub const TRADE_HEADER: [&str; 18] = [
    "time",
    "symbol",
    "side",
    "entry",
    "exit",
    "pnl",
    "pnlPct",
    "exitReason",
    "stopTier",
    "mode",
    "id",
    "entryPamm",
    "entryRsi",
    "entryMacd",
    "exitPamm",
    "exitRsi",
    "exitMacd",
    "tf",
];

pub const SPLIT_HEADER: [&str; 9] = [
    "time",
    "symbol",
    "side",
    "entry",
    "exit",
    "pnl",
    "pnlPct",
    "exitReason",
    "id",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsvOutputSettings {
    pub save_trades: bool,
    pub save_winners: bool,
    pub save_losers: bool,
}

impl Default for CsvOutputSettings {
    fn default() -> Self {
        CsvOutputSettings {
            save_trades: true,
            save_winners: true,
            save_losers: true,
        }
    }
}

pub struct CsvTradeSink {
    dir: PathBuf,
    settings: CsvOutputSettings,
}

impl CsvTradeSink {
    pub fn new(dir: PathBuf, settings: CsvOutputSettings) -> Self {
        Self { dir, settings }
    }

    fn append(&self, file: &str, header: &[&str], row: &[String]) -> Result<(), EngineError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file);
        let needs_header = !has_content(&path);

        let handle = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(handle);

        if needs_header {
            writer.write_record(header).map_err(sink_error)?;
        }
        writer.write_record(row).map_err(sink_error)?;
        writer.flush()?;
        Ok(())
    }
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn sink_error(e: csv::Error) -> EngineError {
    EngineError::TradeSink {
        reason: e.to_string(),
    }
}

fn price(v: f64) -> String {
    format!("{:.2}", v)
}

/// Full trade row in [`TRADE_HEADER`] order.
pub fn trade_row(trade: &Trade) -> Vec<String> {
    vec![
        entry_time(trade),
        trade.symbol.clone(),
        trade.side.to_string(),
        price(trade.entry_price),
        price(trade.exit_price),
        price(trade.pnl),
        price(trade.pnl_pct),
        trade.exit_reason.to_string(),
        trade.stop_tier.to_string(),
        trade.mode.to_string(),
        trade.id.clone(),
        format!("{:.0}", trade.entry.score),
        format!("{:.2}", trade.entry.rsi.unwrap_or(0.0)),
        format!("{:.4}", trade.entry.macd.unwrap_or(0.0)),
        format!("{:.0}", trade.exit.score),
        format!("{:.2}", trade.exit.rsi.unwrap_or(0.0)),
        format!("{:.4}", trade.exit.macd.unwrap_or(0.0)),
        trade.timeframe_min.to_string(),
    ]
}

/// Reduced row in [`SPLIT_HEADER`] order.
pub fn split_row(trade: &Trade) -> Vec<String> {
    vec![
        entry_time(trade),
        trade.symbol.clone(),
        trade.side.to_string(),
        price(trade.entry_price),
        price(trade.exit_price),
        price(trade.pnl),
        price(trade.pnl_pct),
        trade.exit_reason.to_string(),
        trade.id.clone(),
    ]
}

fn entry_time(trade: &Trade) -> String {
    trade.entry_time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl TradeSink for CsvTradeSink {
    fn record(&self, trade: &Trade) -> Result<(), EngineError> {
        if self.settings.save_trades {
            self.append(TRADES_FILE, &TRADE_HEADER, &trade_row(trade))?;
        }
        if self.settings.save_winners && trade.is_winner() {
            self.append(WINNERS_FILE, &SPLIT_HEADER, &split_row(trade))?;
        }
        if self.settings.save_losers && trade.is_loser() {
            self.append(LOSERS_FILE, &SPLIT_HEADER, &split_row(trade))?;
        }
        Ok(())
    }
}
