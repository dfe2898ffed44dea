//! Error taxonomy for the acquisition pipeline.

use serde::{Deserialize, Serialize};

/// Why a single metric query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No reply arrived within the query timeout (after retries).
    Timeout,
    /// The agent answered with an explicit error status or exception value.
    ProtocolError,
    /// Anything else: unreachable host, socket error, malformed reply.
    TransportError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ProtocolError => write!(f, "protocol_error"),
            Self::TransportError => write!(f, "transport_error"),
        }
    }
}

/// Errors surfaced by the pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot parse {value:?} as a number")]
    Parse { value: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Store-side failure with a formatted message.
    pub fn persistence(msg: impl std::fmt::Display) -> Self {
        Self::Persistence(msg.to_string())
    }

    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
