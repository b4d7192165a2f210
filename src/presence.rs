//! Presence registry
//!
//! Tracks connected users (in connect order) and the room → members
//! mapping. Holds no messages; notifications triggered by presence
//! changes are produced by the hub.

use std::collections::HashMap;

use tracing::debug;

use crate::error::HubError;
use crate::room::Room;
use crate::types::{RoomName, UserId};

/// Connected users and room membership
#[derive(Debug, Default)]
pub struct Presence {
    /// Connected users in connect order
    users: Vec<UserId>,
    /// Non-empty rooms: RoomName -> Room
    rooms: HashMap<RoomName, Room>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a user is connected
    pub fn contains(&self, user: &str) -> bool {
        self.users.iter().any(|u| u.as_str() == user)
    }

    /// Connected users in connect order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Register a connected user
    ///
    /// Rejects empty and reserved identifiers and names already in use.
    pub fn insert_user(&mut self, user: UserId) -> Result<(), HubError> {
        if user.is_empty() || user.is_server() {
            return Err(HubError::InvalidUser(user.to_string()));
        }
        if self.contains(user.as_str()) {
            return Err(HubError::DuplicateUser(user.to_string()));
        }
        self.users.push(user);
        Ok(())
    }

    /// Drop a user from the connected set
    ///
    /// Room membership is untouched; callers leave rooms first.
    pub fn remove_user(&mut self, user: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.as_str() != user);
        self.users.len() != before
    }

    /// Room the user currently belongs to, if any
    pub fn room_of(&self, user: &str) -> Option<&RoomName> {
        self.rooms
            .values()
            .find(|room| room.contains(user))
            .map(|room| &room.name)
    }

    /// Members of a room in join order; empty if the room does not exist
    pub fn members(&self, room: &str) -> &[UserId] {
        self.rooms.get(room).map(Room::members).unwrap_or(&[])
    }

    /// Add a user to a room, creating the room on first join
    ///
    /// Does not leave the previous room; callers do that first.
    pub fn add_member(&mut self, room: &RoomName, user: UserId) {
        match self.rooms.get_mut(room.as_str()) {
            Some(existing) => {
                existing.add_member(user);
            }
            None => {
                debug!("Room {} created", room);
                self.rooms.insert(room.clone(), Room::new(room.clone(), user));
            }
        }
    }

    /// Remove a user from every room they belong to
    ///
    /// Returns the rooms left. With the single-room invariant intact this
    /// is at most one room. Rooms left empty are deleted.
    pub fn leave_rooms(&mut self, user: &str) -> Vec<RoomName> {
        let mut left: Vec<RoomName> = self
            .rooms
            .values()
            .filter(|room| room.contains(user))
            .map(|room| room.name.clone())
            .collect();
        left.sort();

        for name in &left {
            let should_delete = self
                .rooms
                .get_mut(name.as_str())
                .is_some_and(|room| room.remove_member(user));
            if should_delete {
                self.rooms.remove(name.as_str());
                debug!("Room {} deleted (empty)", name);
            }
        }

        left
    }

    /// Number of non-empty rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_user_rejects_invalid() {
        let mut presence = Presence::new();

        assert_eq!(
            presence.insert_user("".into()),
            Err(HubError::InvalidUser(String::new()))
        );
        assert_eq!(
            presence.insert_user(UserId::server()),
            Err(HubError::InvalidUser("SERVER".to_string()))
        );
        assert!(presence.users().is_empty());
    }

    #[test]
    fn test_insert_user_rejects_duplicate() {
        let mut presence = Presence::new();

        presence.insert_user("alice".into()).unwrap();
        assert_eq!(
            presence.insert_user("alice".into()),
            Err(HubError::DuplicateUser("alice".to_string()))
        );
        assert_eq!(presence.users().len(), 1);
    }

    #[test]
    fn test_remove_user_keeps_order() {
        let mut presence = Presence::new();
        for name in ["a", "b", "c"] {
            presence.insert_user(name.into()).unwrap();
        }

        assert!(presence.remove_user("b"));
        assert!(!presence.remove_user("b"));

        let names: Vec<&str> = presence.users().iter().map(UserId::as_str).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_room_of() {
        let mut presence = Presence::new();
        presence.add_member(&"r1".into(), "alice".into());

        assert_eq!(presence.room_of("alice").map(RoomName::as_str), Some("r1"));
        assert!(presence.room_of("bob").is_none());
    }

    #[test]
    fn test_leave_rooms_deletes_empty_room() {
        let mut presence = Presence::new();
        presence.add_member(&"r1".into(), "alice".into());
        presence.add_member(&"r1".into(), "bob".into());

        assert_eq!(presence.leave_rooms("alice"), vec![RoomName::from("r1")]);
        assert_eq!(presence.room_count(), 1);

        assert_eq!(presence.leave_rooms("bob"), vec![RoomName::from("r1")]);
        assert_eq!(presence.room_count(), 0);
        assert!(presence.members("r1").is_empty());
    }

    #[test]
    fn test_leave_rooms_when_in_none() {
        let mut presence = Presence::new();
        assert!(presence.leave_rooms("alice").is_empty());
    }

    #[test]
    fn test_leave_rooms_repairs_multi_membership() {
        let mut presence = Presence::new();
        presence.add_member(&"r1".into(), "alice".into());
        presence.add_member(&"r2".into(), "alice".into());

        let left = presence.leave_rooms("alice");
        assert_eq!(left, vec![RoomName::from("r1"), RoomName::from("r2")]);
        assert!(presence.room_of("alice").is_none());
    }
}
