//! Message protocol definitions
//!
//! JSON-based request/response protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Every request is answered
//! with exactly one response, in request order.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, HubError};

/// Client → Server request
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register a user
    Connect { user: String },
    /// Unregister a user
    Disconnect { user: String },
    /// Join a room (leaving the current one)
    Join { user: String, room: String },
    /// Leave the current room
    Leave { user: String },
    /// Send a message; empty `to` broadcasts
    Send {
        from: String,
        #[serde(default)]
        to: String,
        body: String,
    },
    /// List users as seen by `user`
    ListUsers { user: String },
    /// Drain undelivered messages
    ShowMessages { user: String },
    /// History of the user's current room
    ShowRoomMessages { user: String },
}

/// Server → Client response
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Request succeeded with no payload
    Ack,
    /// Room joined; recent room lines
    Joined { lines: Vec<String> },
    /// Leave result
    Left { left: bool },
    /// User listing
    Users { lines: Vec<String> },
    /// Drained or room messages
    Messages { lines: Vec<String> },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidUser,
    DuplicateUser,
    UserNotFound,
    UserNotConnected,
    InvalidArgs,
    DestinationNotFound,
    UserNotInRoom,
    /// Unparseable request or internal failure
    InvalidMessage,
}

impl From<&HubError> for ErrorCode {
    fn from(err: &HubError) -> Self {
        match err {
            HubError::InvalidUser(_) => ErrorCode::InvalidUser,
            HubError::DuplicateUser(_) => ErrorCode::DuplicateUser,
            HubError::UserNotFound(_) => ErrorCode::UserNotFound,
            HubError::UserNotConnected(_) => ErrorCode::UserNotConnected,
            HubError::InvalidArgs => ErrorCode::InvalidArgs,
            HubError::DestinationNotFound(_) => ErrorCode::DestinationNotFound,
            HubError::UserNotInRoom(_) => ErrorCode::UserNotInRoom,
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::Hub(e) => (ErrorCode::from(e), e.to_string()),
            AppError::Json(e) => {
                (ErrorCode::InvalidMessage, format!("Invalid message format: {}", e))
            }
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidMessage, "Internal error".to_string()),
        };
        ServerMessage::Error { code, message }
    }
}

impl From<HubError> for ServerMessage {
    fn from(err: HubError) -> Self {
        AppError::Hub(err).into()
    }
}
