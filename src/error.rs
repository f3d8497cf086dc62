use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors produced by a broker call or by the scheduler that routes it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Network or HTTP failure. Always worth another attempt.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The broker answered but refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The broker does not implement this operation.
    #[error("operation not supported by this exchange: {operation}")]
    Unsupported { operation: &'static str },

    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("unexpected response for {operation}")]
    UnexpectedResponse { operation: &'static str },

    /// The dispatch loop went away before resolving the job.
    #[error("exchange monitor stopped")]
    MonitorStopped,
}

impl ExchangeError {
    /// Whether resubmitting the same request can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Transport(_) | ExchangeError::Rejected(_))
    }
}

/// Errors that stop or interrupt a trading state machine.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("{exchange} configuration parameters are empty or invalid")]
    Misconfigured { exchange: String },

    #[error("signal source closed: {source_name}")]
    SignalsClosed { source_name: &'static str },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl TradingError {
    /// Errors that no amount of retrying will fix.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            TradingError::Misconfigured { .. } => true,
            TradingError::SignalsClosed { .. } => true,
            TradingError::Exchange(e) => matches!(e, ExchangeError::MonitorStopped),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Trading(#[from] TradingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ExchangeError::Transport("timeout".into()).is_retryable());
        assert!(ExchangeError::Rejected("busy".into()).is_retryable());
        assert!(!ExchangeError::MonitorStopped.is_retryable());
        assert!(!ExchangeError::Unsupported {
            operation: "get_order_book"
        }
        .is_retryable());
    }

    #[test]
    fn test_fatal_trading_errors() {
        let misconfigured = TradingError::Misconfigured {
            exchange: "mock".into(),
        };
        assert!(misconfigured.is_fatal());
        assert!(!TradingError::Exchange(ExchangeError::Transport("x".into())).is_fatal());
        assert!(TradingError::Exchange(ExchangeError::MonitorStopped).is_fatal());
    }
}
