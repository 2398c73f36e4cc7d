//! Engine error types.

/// Top-level error type for pammtrader.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("market data error: {reason}")]
    DataProvider { reason: String },

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("trade sink error: {reason}")]
    TradeSink { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn data_provider(reason: impl Into<String>) -> Self {
        EngineError::DataProvider {
            reason: reason.into(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::AlreadyRunning | EngineError::NotRunning => 3,
            EngineError::InvalidArgument { .. } => 4,
            EngineError::DataProvider { .. } => 5,
            EngineError::TradeSink { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            EngineError::invalid_argument("EMA period must be >= 1").to_string(),
            "invalid argument: EMA period must be >= 1"
        );
        assert_eq!(
            EngineError::AlreadyRunning.to_string(),
            "engine is already running"
        );
        let err = EngineError::ConfigInvalid {
            section: "risk".into(),
            key: "daily_max_loss_usd".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] daily_max_loss_usd: must be positive"
        );
    }

    #[test]
    fn exit_codes() {
        use std::process::ExitCode;
        let config_err = EngineError::ConfigMissing {
            section: "engine".into(),
            key: "symbol".into(),
        };
        assert_eq!(
            format!("{:?}", ExitCode::from(&config_err)),
            format!("{:?}", ExitCode::from(2))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&EngineError::data_provider("x"))),
            format!("{:?}", ExitCode::from(5))
        );
    }
}
