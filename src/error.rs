//! Crate-level error types.
//!
//! [`ReplicaError`] unifies the error sources of the session and
//! presentation layers (configuration, WebSocket, JSON, terminal I/O)
//! behind a single enum. The replica engine itself is infallible: protocol
//! anomalies are counted in an [`AnomalyReport`](crate::replica::AnomalyReport)
//! rather than returned as errors.

use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Top-level error type returned by all fallible public APIs.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The pinned CA bundle could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),

    /// A feed frame did not have the expected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Terminal or file I/O failed.
    #[error("io error: {0}")]
    Io(String),

    /// The initial refresh did not complete before the deadline.
    #[error("order book refresh not complete after {0:?}")]
    RefreshTimeout(Duration),
}
