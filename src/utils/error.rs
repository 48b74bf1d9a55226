//! The `error` module defines the error types used across `streamsync`.
//!
//! Each concern gets its own enum so callers can tell a refused connection
//! from a rejected broker call; `Error` wraps them for the binary.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used where the concrete type comes from a transport crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Problems in the desired topology found before any broker call.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("stream name must not be empty")]
    EmptyStreamName,

    #[error("stream `{0}` has no subjects")]
    NoSubjects(String),

    #[error("stream `{0}` is defined more than once")]
    DuplicateStream(String),

    #[error("consumer `{consumer}` is defined more than once on stream `{stream}`")]
    DuplicateConsumer { stream: String, consumer: String },

    #[error("consumer `{consumer}` on stream `{stream}` needs `{field}` for its deliver policy")]
    MissingStartPosition {
        stream: String,
        consumer: String,
        field: &'static str,
    },
}

/// A management call against the broker failed.
///
/// Failures abort the reconciliation loop they happen in. Work done earlier in
/// the same pass stays applied.
#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} failed: {source}")]
    Broker {
        operation: &'static str,
        source: BoxError,
    },

    #[error("could not translate {what} for the broker: {source}")]
    Codec {
        what: &'static str,
        source: serde_json::Error,
    },
}

impl ManagementError {
    pub fn broker(operation: &'static str, err: impl Into<BoxError>) -> Self {
        Self::Broker {
            operation,
            source: err.into(),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Timeout { operation, .. } | Self::Broker { operation, .. } => operation,
            Self::Codec { what, .. } => what,
        }
    }
}

/// Establishing or using the broker connection failed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {servers}: {source}")]
    Transport { servers: String, source: BoxError },

    #[error("connected hook failed: {0}")]
    Hook(#[source] BoxError),

    #[error("not connected to the broker")]
    NotConnected,
}

/// Top-level error returned by the connection manager and the binary.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Management(#[from] ManagementError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
