//! Routing engine
//!
//! Decides which mailboxes a message lands in. Reads the presence
//! registry and writes the mailbox store; the caller holds both
//! exclusively for the whole routing decision.

use tracing::debug;

use crate::codec::MailboxEntry;
use crate::error::HubError;
use crate::mailbox::MailboxStore;
use crate::presence::Presence;
use crate::types::{RoomName, UserId};

/// A message fanned out to a room, or to everyone when `room` is empty
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// User the message is about (or from)
    pub actor: UserId,
    pub room: RoomName,
    pub body: String,
    /// Skip the actor's own mailbox
    pub exclude_actor: bool,
    /// Stamp the actor as sender instead of the system user
    pub from_actor: bool,
}

impl Broadcast {
    /// System notification about `actor`, reaching the actor too
    pub fn notice(actor: &UserId, room: RoomName, body: String) -> Self {
        Self {
            actor: actor.clone(),
            room,
            body,
            exclude_actor: false,
            from_actor: false,
        }
    }
}

/// Where a routed message ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Private message, tagged with the shared room if any
    Direct { to: UserId, room: RoomName },
    /// Room broadcast, sender included
    Room { room: RoomName, recipients: usize },
    /// Global broadcast, sender excluded
    Global { recipients: usize },
    /// Empty body without destination
    Nothing,
}

/// Append one copy of the broadcast entry to every target mailbox
///
/// Returns the number of mailboxes reached.
pub fn fan_out(presence: &Presence, mailboxes: &mut MailboxStore, broadcast: Broadcast) -> usize {
    let sender = if broadcast.from_actor {
        broadcast.actor.clone()
    } else {
        UserId::server()
    };
    let entry = MailboxEntry::new(sender, broadcast.room.clone(), broadcast.body);

    let targets = if broadcast.room.is_empty() {
        presence.users()
    } else {
        presence.members(broadcast.room.as_str())
    };

    let mut reached = 0;
    for target in targets {
        if broadcast.exclude_actor && *target == broadcast.actor {
            continue;
        }
        if mailboxes.append(target.as_str(), entry.clone()) {
            reached += 1;
        }
    }

    debug!(
        "Broadcast from {} to {} reached {} mailbox(es)",
        broadcast.actor,
        if broadcast.room.is_empty() { "everyone" } else { broadcast.room.as_str() },
        reached
    );
    reached
}

/// Route a user message
///
/// - non-empty `dest`: private message to `dest` only
/// - empty `dest`, sender in a room: broadcast to the room, sender included
/// - empty `dest`, no room: broadcast to everyone but the sender
/// - empty `dest` and empty `body`: nothing
pub fn route(
    presence: &Presence,
    mailboxes: &mut MailboxStore,
    sender: &UserId,
    dest: &str,
    body: &str,
) -> Result<Delivery, HubError> {
    if !dest.is_empty() {
        if !presence.contains(dest) {
            return Err(HubError::DestinationNotFound(dest.to_string()));
        }

        let room = match (presence.room_of(sender.as_str()), presence.room_of(dest)) {
            (Some(src), Some(dst)) if src == dst => src.clone(),
            _ => RoomName::default(),
        };
        let entry = MailboxEntry::new(sender.clone(), room.clone(), body);
        mailboxes.append(dest, entry);

        return Ok(Delivery::Direct {
            to: dest.into(),
            room,
        });
    }

    if body.is_empty() {
        return Ok(Delivery::Nothing);
    }

    let room = presence.room_of(sender.as_str()).cloned().unwrap_or_default();
    let in_room = !room.is_empty();
    let recipients = fan_out(
        presence,
        mailboxes,
        Broadcast {
            actor: sender.clone(),
            room: room.clone(),
            body: body.to_string(),
            exclude_actor: !in_room,
            from_actor: true,
        },
    );

    Ok(if in_room {
        Delivery::Room { room, recipients }
    } else {
        Delivery::Global { recipients }
    })
}
