// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed node name: {0}")]
    MalformedNode(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    /// The CI server could not be reached at all (DNS, refused, timeout).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The CI server answered, but with an error status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What the sweep loop should do after a sweep failed with a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Recreate the CI client, then pause as usual.
    Reconnect,
    /// Pause twice as long to go easy on a degraded server.
    Backoff,
    /// Abandon the sweep, log it, pause as usual.
    Abort,
}

impl SchedError {
    pub fn recovery(&self) -> Recovery {
        match self {
            SchedError::Connection(_) => Recovery::Reconnect,
            SchedError::Api { .. } => Recovery::Backoff,
            _ => Recovery::Abort,
        }
    }

    /// Configuration errors are fatal at startup.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SchedError::ConfigError(_)
                | SchedError::MalformedNode(_)
                | SchedError::DagCycle(_)
                | SchedError::TomlError(_)
        )
    }
}

impl From<reqwest::Error> for SchedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || (err.is_request() && err.status().is_none()) {
            SchedError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            SchedError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SchedError::Other(anyhow::Error::from(err))
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedError>;
