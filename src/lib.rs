//! Minimal Chat Hub Library
//!
//! A WebSocket chat hub where clients register under a user name,
//! optionally join a room, exchange broadcast/room/private messages and
//! poll their mailbox for undelivered messages.
//!
//! # Features
//! - User registration with unique names
//! - Implicit rooms (exist while they have members), one room per user
//! - Global, room and private messages
//! - Per-user mailboxes drained by polling, each message delivered once
//! - Room history across all members' mailboxes
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` holds presence and mailboxes and implements every operation
//! - `ChatServer` is the actor that owns the `Hub`
//! - `HubHandle` sends commands and awaits `oneshot` replies
//! - Each connection has a `handler` task turning JSON requests into commands
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_hub::{serve, Hub, HubHandle};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:1234").await.unwrap();
//!     let hub = HubHandle::spawn(Hub::new(), 256);
//!     serve(listener, hub).await;
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod mailbox;
pub mod message;
pub mod presence;
pub mod room;
pub mod routing;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Command, Connection};
pub use codec::MailboxEntry;
pub use config::ServerConfig;
pub use error::{AppError, ConfigError, HubError};
pub use handler::{handle_connection, serve};
pub use hub::Hub;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use routing::Delivery;
pub use server::{ChatServer, HubHandle, ServerCommand};
pub use types::{ConnectionId, RoomName, UserId, SERVER_USER};
