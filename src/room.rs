//! Room struct definition
//!
//! Represents a named room and its members in join order.

use crate::types::{RoomName, UserId};

/// Chat room
///
/// A room only exists while it has at least one member. The registry
/// drops it as soon as `remove_member` reports it empty.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Members in join order
    members: Vec<UserId>,
}

impl Room {
    /// Create a new room with its first member
    pub fn new(name: RoomName, first: UserId) -> Self {
        Self {
            name,
            members: vec![first],
        }
    }

    /// Check if a user is in this room
    pub fn contains(&self, user: &str) -> bool {
        self.members.iter().any(|m| m.as_str() == user)
    }

    /// Add a member at the end of the join order
    ///
    /// Returns false if the user was already a member.
    pub fn add_member(&mut self, user: UserId) -> bool {
        if self.contains(user.as_str()) {
            false
        } else {
            self.members.push(user);
            true
        }
    }

    /// Remove a member
    ///
    /// Returns true if the room should be deleted (no members left).
    pub fn remove_member(&mut self, user: &str) -> bool {
        self.members.retain(|m| m.as_str() != user);
        self.members.is_empty()
    }

    /// Members in join order
    pub fn members(&self) -> &[UserId] {
        &self.members
    }
}
