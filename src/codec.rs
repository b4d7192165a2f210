//! Mailbox entry codec
//!
//! A mailbox entry is stored as a structured [`MailboxEntry`]. The flat
//! record form is kept for logs and for any boundary that wants a single
//! string per entry:
//!
//! ```text
//! ->1700000000000000000->alice->lobby->hello     (undelivered)
//! 1700000000000000000->alice->lobby->hello       (delivered)
//! ```
//!
//! The leading `->` is the undelivered marker. The body is the last field
//! and may itself contain `->`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

use crate::types::{RoomName, UserId};

/// Field separator, also used as the undelivered marker
pub const DELIM: &str = "->";

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Nanoseconds since the Unix epoch, strictly increasing across calls.
pub fn next_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let prev = LAST_TIMESTAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1)
}

/// Record parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("record has fewer than four fields")]
    MissingFields,
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// One entry of a user's mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailboxEntry {
    /// Set once the entry has been returned by a drain
    pub delivered: bool,
    /// Creation time in nanoseconds
    pub timestamp: u64,
    pub sender: UserId,
    /// Empty when the entry is not room-scoped
    pub room: RoomName,
    pub body: String,
}

impl MailboxEntry {
    /// Create a fresh, undelivered entry stamped with the current time.
    ///
    /// Entries sent by the system user are never room-scoped in storage.
    pub fn new(sender: UserId, room: RoomName, body: impl Into<String>) -> Self {
        let room = if sender.is_server() { RoomName::default() } else { room };
        Self {
            delivered: false,
            timestamp: next_timestamp(),
            sender,
            room,
            body: body.into(),
        }
    }

    /// Flip the entry to delivered.
    ///
    /// Returns true if the entry was undelivered before the call.
    pub fn mark_delivered(&mut self) -> bool {
        !std::mem::replace(&mut self.delivered, true)
    }

    /// `sender -> body`, the line shown when a mailbox is drained
    pub fn display_line(&self) -> String {
        format!("{} -> {}", self.sender, self.body)
    }

    /// Serialize to the flat record form
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a record, falling back to the empty entry when it is malformed
    pub fn decode(record: &str) -> Self {
        record.parse().unwrap_or_default()
    }
}

impl fmt::Display for MailboxEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.delivered {
            f.write_str(DELIM)?;
        }
        write!(
            f,
            "{}{DELIM}{}{DELIM}{}{DELIM}{}",
            self.timestamp, self.sender, self.room, self.body
        )
    }
}

impl FromStr for MailboxEntry {
    type Err = CodecError;

    fn from_str(record: &str) -> Result<Self, Self::Err> {
        let (delivered, rest) = match record.strip_prefix(DELIM) {
            Some(rest) => (false, rest),
            None => (true, record),
        };

        let mut fields = rest.splitn(4, DELIM);
        let (Some(timestamp), Some(sender), Some(room), Some(body)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(CodecError::MissingFields);
        };

        let timestamp = timestamp
            .parse()
            .map_err(|_| CodecError::InvalidTimestamp(timestamp.to_string()))?;

        Ok(Self {
            delivered,
            timestamp,
            sender: sender.into(),
            room: room.into(),
            body: body.to_string(),
        })
    }
}

/// Strip the undelivered marker from a record; delivered records are
/// returned unchanged.
pub fn mark_record_delivered(record: &str) -> String {
    record.strip_prefix(DELIM).unwrap_or(record).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_undelivered() {
        let entry = MailboxEntry::new("alice".into(), "lobby".into(), "hi");
        assert!(!entry.delivered);
        assert_eq!(entry.room.as_str(), "lobby");
        assert!(entry.encode().starts_with(DELIM));
    }

    #[test]
    fn test_server_entry_never_room_scoped() {
        let entry = MailboxEntry::new(UserId::server(), "lobby".into(), "bob joined room lobby");
        assert!(entry.room.is_empty());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let a = next_timestamp();
        let b = next_timestamp();
        let c = next_timestamp();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_encode_format() {
        let entry = MailboxEntry {
            delivered: false,
            timestamp: 42,
            sender: "alice".into(),
            room: "".into(),
            body: "hi".to_string(),
        };
        assert_eq!(entry.encode(), "->42->alice->->hi");
    }

    #[test]
    fn test_decode_body_containing_delimiter() {
        let entry = MailboxEntry::decode("->7->bob->r1->a -> b -> c");
        assert!(!entry.delivered);
        assert_eq!(entry.timestamp, 7);
        assert_eq!(entry.sender.as_str(), "bob");
        assert_eq!(entry.room.as_str(), "r1");
        assert_eq!(entry.body, "a -> b -> c");
    }

    #[test]
    fn test_decode_delivered_record() {
        let entry: MailboxEntry = "9->SERVER->->carol joined".parse().unwrap();
        assert!(entry.delivered);
        assert_eq!(entry.body, "carol joined");
    }

    #[test]
    fn test_decode_missing_fields_gives_sentinel() {
        assert_eq!(
            "->1->alice->hi".parse::<MailboxEntry>(),
            Err(CodecError::MissingFields)
        );
        assert_eq!(MailboxEntry::decode("->1->alice->hi"), MailboxEntry::default());
        assert_eq!(MailboxEntry::decode(""), MailboxEntry::default());
    }

    #[test]
    fn test_decode_bad_timestamp() {
        assert!(matches!(
            "->abc->alice->->hi".parse::<MailboxEntry>(),
            Err(CodecError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_mark_delivered_once() {
        let mut entry = MailboxEntry::new("alice".into(), "".into(), "hi");
        assert!(entry.mark_delivered());
        assert!(!entry.mark_delivered());
        assert!(entry.delivered);
    }

    #[test]
    fn test_mark_record_delivered_idempotent() {
        let once = mark_record_delivered("->5->alice->->hi");
        assert_eq!(once, "5->alice->->hi");
        assert_eq!(mark_record_delivered(&once), once);
    }

    #[test]
    fn test_display_line() {
        let entry = MailboxEntry::new("alice".into(), "".into(), "hello there");
        assert_eq!(entry.display_line(), "alice -> hello there");
    }
}
