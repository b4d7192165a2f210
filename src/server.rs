//! ChatServer Actor implementation
//!
//! The central actor that owns the hub state: presence registry and
//! mailboxes. Commands are applied one at a time, so every request sees
//! and leaves a consistent hub without any locking.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::{AppError, HubError};
use crate::hub::Hub;
use crate::types::ConnectionId;

/// Reply channel for a command that may be rejected
type Reply<T> = oneshot::Sender<Result<T, HubError>>;

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Register a user, optionally owned by a connection
    Connect {
        user: String,
        owner: Option<ConnectionId>,
        reply: Reply<()>,
    },
    /// Unregister a user
    Disconnect { user: String, reply: Reply<()> },
    /// Unregister a user only if `owner` still holds it
    Release {
        user: String,
        owner: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    /// Join a room
    Join {
        user: String,
        room: String,
        reply: Reply<Vec<String>>,
    },
    /// Leave the current room
    Leave {
        user: String,
        reply: oneshot::Sender<bool>,
    },
    /// Route a message
    Send {
        from: String,
        to: String,
        body: String,
        reply: Reply<()>,
    },
    /// List users as seen by a caller
    ListUsers {
        user: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Drain a mailbox
    ShowMessages {
        user: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Room history
    ShowRoomMessages {
        user: String,
        reply: Reply<Vec<String>>,
    },
}

/// The main ChatServer actor
///
/// Owns the hub and processes commands from connection handlers.
pub struct ChatServer {
    hub: Hub,
    /// Connection that registered each user: user -> ConnectionId
    owners: HashMap<String, ConnectionId>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(hub: Hub, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            hub,
            owners: HashMap::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    ///
    /// A dropped reply channel only means the caller went away.
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { user, owner, reply } => {
                let result = self.hub.add_user(user.as_str().into());
                if let (Ok(()), Some(owner)) = (&result, owner) {
                    self.owners.insert(user, owner);
                }
                let _ = reply.send(result);
            }
            ServerCommand::Disconnect { user, reply } => {
                let result = self.hub.remove_user(&user);
                if result.is_ok() {
                    self.owners.remove(&user);
                }
                let _ = reply.send(result);
            }
            ServerCommand::Release { user, owner, reply } => {
                let _ = reply.send(self.release(&user, owner));
            }
            ServerCommand::Join { user, room, reply } => {
                let _ = reply.send(self.hub.join_room(&user, &room));
            }
            ServerCommand::Leave { user, reply } => {
                let _ = reply.send(self.hub.leave_room(&user));
            }
            ServerCommand::Send {
                from,
                to,
                body,
                reply,
            } => {
                let _ = reply.send(self.hub.send(&from, &to, &body).map(|_| ()));
            }
            ServerCommand::ListUsers { user, reply } => {
                let _ = reply.send(self.hub.list_users(&user));
            }
            ServerCommand::ShowMessages { user, reply } => {
                let _ = reply.send(self.hub.show_messages(&user));
            }
            ServerCommand::ShowRoomMessages { user, reply } => {
                let _ = reply.send(self.hub.show_room_messages(&user));
            }
        }

        debug!(
            "Total users: {}, Total rooms: {}",
            self.hub.user_count(),
            self.hub.room_count()
        );
    }

    /// Disconnect `user` if `owner` is the connection that registered it
    ///
    /// A name freed by another connection and taken again is left alone.
    fn release(&mut self, user: &str, owner: ConnectionId) -> bool {
        if self.owners.get(user) != Some(&owner) {
            debug!("{} is not held by connection {}, nothing to release", user, owner);
            return false;
        }

        self.owners.remove(user);
        self.hub.remove_user(user).is_ok()
    }
}

/// Cloneable front for the ChatServer actor
///
/// Each method sends one command and waits for its reply.
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<ServerCommand>,
}

impl HubHandle {
    pub fn new(sender: mpsc::Sender<ServerCommand>) -> Self {
        Self { sender }
    }

    /// Spawn a ChatServer actor on the current runtime and return its handle
    pub fn spawn(hub: Hub, buffer: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        tokio::spawn(ChatServer::new(hub, receiver).run());
        Self::new(sender)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ServerCommand,
    ) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| AppError::ChannelSend)?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    pub async fn connect(&self, user: &str) -> Result<(), AppError> {
        self.connect_owned(user, None).await
    }

    /// Connect a user on behalf of a connection, which may later `release` it
    pub async fn connect_owned(
        &self,
        user: &str,
        owner: Option<ConnectionId>,
    ) -> Result<(), AppError> {
        let user = user.to_string();
        Ok(self
            .request(|reply| ServerCommand::Connect { user, owner, reply })
            .await??)
    }

    /// Disconnect a user if `owner` still holds it
    ///
    /// Returns true if the user was disconnected.
    pub async fn release(&self, user: &str, owner: ConnectionId) -> Result<bool, AppError> {
        let user = user.to_string();
        self.request(|reply| ServerCommand::Release { user, owner, reply })
            .await
    }

    pub async fn disconnect(&self, user: &str) -> Result<(), AppError> {
        let user = user.to_string();
        Ok(self
            .request(|reply| ServerCommand::Disconnect { user, reply })
            .await??)
    }

    pub async fn join(&self, user: &str, room: &str) -> Result<Vec<String>, AppError> {
        let (user, room) = (user.to_string(), room.to_string());
        Ok(self
            .request(|reply| ServerCommand::Join { user, room, reply })
            .await??)
    }

    pub async fn leave(&self, user: &str) -> Result<bool, AppError> {
        let user = user.to_string();
        self.request(|reply| ServerCommand::Leave { user, reply })
            .await
    }

    pub async fn send(&self, from: &str, to: &str, body: &str) -> Result<(), AppError> {
        let (from, to, body) = (from.to_string(), to.to_string(), body.to_string());
        Ok(self
            .request(|reply| ServerCommand::Send {
                from,
                to,
                body,
                reply,
            })
            .await??)
    }

    pub async fn list_users(&self, user: &str) -> Result<Vec<String>, AppError> {
        let user = user.to_string();
        self.request(|reply| ServerCommand::ListUsers { user, reply })
            .await
    }

    pub async fn show_messages(&self, user: &str) -> Result<Vec<String>, AppError> {
        let user = user.to_string();
        self.request(|reply| ServerCommand::ShowMessages { user, reply })
            .await
    }

    pub async fn show_room_messages(&self, user: &str) -> Result<Vec<String>, AppError> {
        let user = user.to_string();
        Ok(self
            .request(|reply| ServerCommand::ShowRoomMessages { user, reply })
            .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_hub() -> HubHandle {
        HubHandle::spawn(Hub::new(), 16)
    }

    #[tokio::test]
    async fn test_connect_and_poll() {
        let hub = spawn_hub();

        hub.connect("alice").await.unwrap();
        hub.connect("bob").await.unwrap();
        hub.send("bob", "alice", "hello").await.unwrap();

        let lines = hub.show_messages("alice").await.unwrap();
        assert_eq!(
            lines,
            ["SERVER -> alice joined", "SERVER -> bob joined", "bob -> hello"]
        );
        assert!(hub.show_messages("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hub_errors_pass_through() {
        let hub = spawn_hub();

        hub.connect("alice").await.unwrap();
        let err = hub.connect("alice").await.unwrap_err();
        assert!(matches!(err, AppError::Hub(HubError::DuplicateUser(_))));

        let err = hub.show_room_messages("alice").await.unwrap_err();
        assert!(matches!(err, AppError::Hub(HubError::UserNotInRoom(_))));
    }

    #[tokio::test]
    async fn test_room_round_trip() {
        let hub = spawn_hub();
        hub.connect("alice").await.unwrap();
        hub.connect("bob").await.unwrap();

        hub.join("alice", "lobby").await.unwrap();
        hub.join("bob", "lobby").await.unwrap();
        hub.send("alice", "", "hi all").await.unwrap();

        assert_eq!(
            hub.list_users("bob").await.unwrap(),
            ["Current room: lobby", "alice", "*bob"]
        );
        assert_eq!(
            hub.show_room_messages("bob").await.unwrap(),
            ["alice -> alice: hi all", "alice -> bob: hi all"]
        );
        assert!(hub.leave("bob").await.unwrap());
        assert!(!hub.leave("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_connects_stay_unique() {
        let hub = spawn_hub();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move { hub.connect("same").await.is_ok() }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(hub.list_users("same").await.unwrap(), ["*same"]);
    }

    #[tokio::test]
    async fn test_release_only_by_owner() {
        let hub = spawn_hub();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        hub.connect_owned("alice", Some(first)).await.unwrap();
        assert!(!hub.release("alice", second).await.unwrap());
        assert_eq!(hub.list_users("alice").await.unwrap(), ["*alice"]);

        assert!(hub.release("alice", first).await.unwrap());
        assert!(hub.list_users("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_after_name_reused() {
        let hub = spawn_hub();
        let stale = ConnectionId::new();
        let current = ConnectionId::new();

        hub.connect_owned("alice", Some(stale)).await.unwrap();
        hub.disconnect("alice").await.unwrap();
        hub.connect_owned("alice", Some(current)).await.unwrap();

        assert!(!hub.release("alice", stale).await.unwrap());
        assert_eq!(hub.list_users("alice").await.unwrap(), ["*alice"]);
    }

    #[tokio::test]
    async fn test_closed_server_reports_channel_error() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let hub = HubHandle::new(sender);

        assert!(matches!(
            hub.connect("alice").await,
            Err(AppError::ChannelSend)
        ));
    }
}
