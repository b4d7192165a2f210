//! Basic type definitions for the chat hub
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identifier for a WebSocket connection
//! - `UserId`: user-chosen identifier, unique while connected
//! - `RoomName`: name of an implicitly created room

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier reserved for system-originated messages.
///
/// No real user may connect under this name.
pub const SERVER_USER: &str = "SERVER";

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Only used to tell connections apart in logs;
/// the hub itself knows users, not connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier
///
/// Opaque string chosen by the client. Implements `Borrow<str>` so maps
/// keyed by `UserId` can be queried with a plain `&str`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for the reserved system sender
    pub fn is_server(&self) -> bool {
        self.0 == SERVER_USER
    }

    /// The system sender identifier
    pub fn server() -> Self {
        Self(SERVER_USER.to_string())
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room name
///
/// An empty name means "no room" wherever a room tag is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(pub String);

impl RoomName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for RoomName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RoomName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_server_user_reserved() {
        assert!(UserId::server().is_server());
        assert!(!UserId::from("alice").is_server());
    }

    #[test]
    fn test_user_id_str_lookup() {
        let mut map = HashMap::new();
        map.insert(UserId::from("alice"), 1);
        assert_eq!(map.get("alice"), Some(&1));
        assert!(map.get("bob").is_none());
    }
}
