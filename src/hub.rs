//! Hub state
//!
//! The single owned aggregate of presence registry and mailbox store.
//! Every request operation is a method here; each validates first and
//! only then mutates, so a failed request leaves the hub untouched.
//! The hub is not shared directly: the `ChatServer` actor owns it and
//! applies requests one at a time.

use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::mailbox::MailboxStore;
use crate::presence::Presence;
use crate::routing::{self, Broadcast, Delivery};
use crate::types::{RoomName, UserId};

/// Default number of room lines returned by a join
pub const DEFAULT_JOIN_HISTORY: usize = 20;

/// Presence and mailboxes of every connected user
#[derive(Debug)]
pub struct Hub {
    presence: Presence,
    mailboxes: MailboxStore,
    /// Room lines returned by `join_room`
    join_history: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::with_join_history(DEFAULT_JOIN_HISTORY)
    }

    pub fn with_join_history(join_history: usize) -> Self {
        Self {
            presence: Presence::new(),
            mailboxes: MailboxStore::new(),
            join_history,
        }
    }

    /// Connect a user and announce it to everyone, the user included
    pub fn add_user(&mut self, user: UserId) -> Result<(), HubError> {
        if let Err(e) = self.presence.insert_user(user.clone()) {
            warn!("Connect rejected: {}", e);
            return Err(e);
        }
        self.mailboxes.open(user.clone());
        info!("{} connected ({} online)", user, self.presence.users().len());

        self.notify(&user, RoomName::default(), format!("{user} joined"));
        Ok(())
    }

    /// Disconnect a user: leave its room, drop its mailbox, announce it
    pub fn remove_user(&mut self, user: &str) -> Result<(), HubError> {
        if !self.presence.contains(user) {
            warn!("Disconnect of unknown user '{}'", user);
            return Err(HubError::UserNotFound(user.to_string()));
        }

        self.leave_room(user);
        self.presence.remove_user(user);
        self.mailboxes.close(user);
        info!("{} removed ({} online)", user, self.presence.users().len());

        self.notify(&user.into(), RoomName::default(), format!("{user} removed"));
        Ok(())
    }

    /// Move a user into a room, leaving any previous one
    ///
    /// Returns the most recent lines of the room's history.
    pub fn join_room(&mut self, user: &str, room: &str) -> Result<Vec<String>, HubError> {
        if user.is_empty() || room.is_empty() {
            return Err(HubError::InvalidArgs);
        }
        if !self.presence.contains(user) {
            warn!("Join by unconnected user '{}'", user);
            return Err(HubError::UserNotConnected(user.to_string()));
        }

        self.leave_room(user);

        let room = RoomName::from(room);
        self.presence.add_member(&room, user.into());
        info!("{} joined room {}", user, room);

        self.notify(&user.into(), room.clone(), format!("{user} joined room {room}"));

        let lines = self.mailboxes.room_lines(&room);
        let skip = lines.len().saturating_sub(self.join_history);
        Ok(lines.into_iter().skip(skip).collect())
    }

    /// Remove a user from its room
    ///
    /// Returns false if the user was in no room.
    pub fn leave_room(&mut self, user: &str) -> bool {
        let left = self.presence.leave_rooms(user);
        if left.len() > 1 {
            warn!("{} was a member of {} rooms", user, left.len());
        }

        let actor = UserId::from(user);
        for room in &left {
            info!("{} left room {}", user, room);
            self.notify(&actor, room.clone(), format!("{user} leaved room {room}"));
        }
        !left.is_empty()
    }

    /// Room the user currently belongs to
    pub fn room_of(&self, user: &str) -> Option<&RoomName> {
        self.presence.room_of(user)
    }

    /// Route a user message (private, room or global)
    pub fn send(&mut self, sender: &str, dest: &str, body: &str) -> Result<Delivery, HubError> {
        let delivery = routing::route(
            &self.presence,
            &mut self.mailboxes,
            &sender.into(),
            dest,
            body,
        )
        .inspect_err(|e| warn!("Message from {} rejected: {}", sender, e))?;

        debug!("Message from {} routed: {:?}", sender, delivery);
        Ok(delivery)
    }

    /// User list as seen by `caller`, the caller's own line marked with `*`
    ///
    /// Outside a room: every connected user. Inside a room: a header line
    /// followed by the room's members.
    pub fn list_users(&self, caller: &str) -> Vec<String> {
        let mark = |user: &UserId| {
            if user.as_str() == caller {
                format!("*{user}")
            } else {
                user.to_string()
            }
        };

        match self.presence.room_of(caller) {
            Some(room) => std::iter::once(format!("Current room: {room}"))
                .chain(self.presence.members(room.as_str()).iter().map(mark))
                .collect(),
            None => self.presence.users().iter().map(mark).collect(),
        }
    }

    /// Drain a user's undelivered messages
    pub fn show_messages(&mut self, user: &str) -> Vec<String> {
        self.mailboxes.drain_undelivered(user)
    }

    /// Full history of the user's current room
    pub fn show_room_messages(&mut self, user: &str) -> Result<Vec<String>, HubError> {
        let room = self.presence.room_of(user);
        self.mailboxes.room_history(user, room)
    }

    /// Number of connected users
    pub fn user_count(&self) -> usize {
        self.presence.users().len()
    }

    /// Number of non-empty rooms
    pub fn room_count(&self) -> usize {
        self.presence.room_count()
    }

    fn notify(&mut self, actor: &UserId, room: RoomName, body: String) {
        routing::fan_out(
            &self.presence,
            &mut self.mailboxes,
            Broadcast::notice(actor, room, body),
        );
    }
}
