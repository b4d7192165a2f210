//! Error types for the chat hub
//!
//! Defines hub (request-level) errors, transport errors and
//! configuration errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Request-level errors raised by the hub
///
/// None of these are fatal: the request fails and the hub state
/// is left exactly as it was before the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Empty identifier or the reserved system identifier
    #[error("Invalid username: '{0}'")]
    InvalidUser(String),

    /// Identifier already connected
    #[error("Duplicate user: '{0}'")]
    DuplicateUser(String),

    /// Disconnect of an identifier that is not connected
    #[error("User not found: '{0}'")]
    UserNotFound(String),

    /// Room operation by an identifier that is not connected
    #[error("User '{0}' is not connected")]
    UserNotConnected(String),

    /// Missing user or room name
    #[error("Invalid user name or room name")]
    InvalidArgs,

    /// Private message to an identifier that is not connected
    #[error("{0} not found")]
    DestinationNotFound(String),

    /// Room history requested by a user outside any room
    #[error("{0} did not join any room")]
    UserNotInRoom(String),
}

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// hub errors (sent back to the client as an error response).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Peer closed the WebSocket before answering
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request rejected by the hub
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port outside the accepted range or not a number
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Unparseable `host:port` argument
    #[error("Invalid address '{0}': {1}")]
    InvalidAddr(String, std::net::AddrParseError),

    /// Unparseable numeric setting
    #[error("Invalid value for {0}: '{1}'")]
    InvalidValue(&'static str, String),

    /// Too many command line arguments
    #[error("Usage: {0} [port|host:port]")]
    Usage(String),
}
