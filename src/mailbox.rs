//! Mailbox store
//!
//! One append-only log of [`MailboxEntry`] per connected user. Entries are
//! never removed while the user stays connected; draining only flips the
//! delivered flag.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::codec::MailboxEntry;
use crate::error::HubError;
use crate::types::{RoomName, UserId};

/// Per-user mailboxes
#[derive(Debug, Default)]
pub struct MailboxStore {
    boxes: HashMap<UserId, Vec<MailboxEntry>>,
}

impl MailboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty mailbox, replacing any previous one
    pub fn open(&mut self, user: UserId) {
        self.boxes.insert(user, Vec::new());
    }

    /// Discard a user's mailbox
    pub fn close(&mut self, user: &str) {
        self.boxes.remove(user);
    }

    /// Append an entry to the tail of a mailbox
    ///
    /// Returns false (and drops the entry) if the user has no mailbox.
    pub fn append(&mut self, user: &str, entry: MailboxEntry) -> bool {
        match self.boxes.get_mut(user) {
            Some(mailbox) => {
                trace!("{} <= {}", user, entry);
                mailbox.push(entry);
                true
            }
            None => {
                debug!("Dropping entry for unknown mailbox {}", user);
                false
            }
        }
    }

    /// All entries of a mailbox, delivered or not
    pub fn entries(&self, user: &str) -> &[MailboxEntry] {
        self.boxes.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mark every undelivered entry delivered and return their display lines
    ///
    /// Each entry is yielded by exactly one drain over the mailbox lifetime.
    pub fn drain_undelivered(&mut self, user: &str) -> Vec<String> {
        let Some(mailbox) = self.boxes.get_mut(user) else {
            return Vec::new();
        };

        mailbox
            .iter_mut()
            .filter_map(|entry| entry.mark_delivered().then(|| entry.display_line()))
            .collect()
    }

    /// Room history for a user, formatted `sender -> owner: body`
    ///
    /// Collects every entry tagged with `room` across all mailboxes, marks
    /// each delivered and returns them ordered by timestamp, then sender,
    /// room, body and mailbox owner.
    pub fn room_history(
        &mut self,
        user: &str,
        room: Option<&RoomName>,
    ) -> Result<Vec<String>, HubError> {
        let room = room
            .filter(|r| !r.is_empty())
            .ok_or_else(|| HubError::UserNotInRoom(user.to_string()))?;

        for entry in self
            .boxes
            .values_mut()
            .flat_map(|mailbox| mailbox.iter_mut())
            .filter(|entry| entry.room == *room)
        {
            entry.mark_delivered();
        }

        Ok(self.room_lines(room))
    }

    /// Room history without touching delivery state
    pub fn room_lines(&self, room: &RoomName) -> Vec<String> {
        let mut tagged: Vec<(&UserId, &MailboxEntry)> = self
            .boxes
            .iter()
            .flat_map(|(owner, mailbox)| mailbox.iter().map(move |entry| (owner, entry)))
            .filter(|(_, entry)| entry.room == *room)
            .collect();

        tagged.sort_by(|(owner_a, a), (owner_b, b)| {
            (a.timestamp, &a.sender, &a.room, &a.body, *owner_a)
                .cmp(&(b.timestamp, &b.sender, &b.room, &b.body, *owner_b))
        });

        tagged
            .into_iter()
            .map(|(owner, entry)| format!("{} -> {}: {}", entry.sender, owner, entry.body))
            .collect()
    }
}
