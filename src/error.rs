//! Error hierarchy for the crate.
//!
//! A hand-rolled `enum` with manual `From` impls rather than a derive macro,
//! so the mapping from failure kind to variant stays explicit.

use std::fmt;

/// The crate's single public error type.
#[derive(Debug)]
pub enum KumiteError {
    /// Trial / move-database schema problem caught once at load time.
    Validation(String),
    /// The input driver could not be started or stopped delivering frames.
    Driver(String),
    /// A caller-side contract was broken (duplicate or non-monotonic frame
    /// numbers). Not expected to be recoverable.
    Invariant(String),
    /// Failure decoding a trial document, move database, or settings file.
    Json(serde_json::Error),
    /// Failure loading layered settings.
    Config(config::ConfigError),
    Io(std::io::Error),
}

pub type KumiteResult<T = ()> = Result<T, KumiteError>;

impl fmt::Display for KumiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KumiteError::Validation(msg) => write!(f, "validation error: {}", msg),
            KumiteError::Driver(msg) => write!(f, "driver error: {}", msg),
            KumiteError::Invariant(msg) => write!(f, "invariant breach: {}", msg),
            KumiteError::Json(e) => write!(f, "json error: {}", e),
            KumiteError::Config(e) => write!(f, "config error: {}", e),
            KumiteError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for KumiteError {}

impl From<serde_json::Error> for KumiteError {
    fn from(e: serde_json::Error) -> KumiteError {
        KumiteError::Json(e)
    }
}

impl From<config::ConfigError> for KumiteError {
    fn from(e: config::ConfigError) -> KumiteError {
        KumiteError::Config(e)
    }
}

impl From<std::io::Error> for KumiteError {
    fn from(e: std::io::Error) -> KumiteError {
        KumiteError::Io(e)
    }
}
