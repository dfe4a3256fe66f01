//! Error types for the metrics engine

use thiserror::Error;

/// Main error type for the metrics engine
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed ingest payload (bad datum, bad statistic set, bad identity)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed query parameters (period, statistics selection, window)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Shorthand for an [`Error::InvalidQuery`]
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    /// Stable error code reported to API clients
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidQuery(_) => "InvalidQuery",
            Error::Configuration(_) => "Configuration",
            Error::Io(_) => "InternalFailure",
            Error::Serialization(_) => "InternalFailure",
        }
    }

    /// Whether the caller is at fault (as opposed to the engine)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidQuery(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
