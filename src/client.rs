//! Client side of the protocol
//!
//! [`Connection`] sends one request and waits for its response.
//! [`Command`] parses a line typed by the user and maps it onto a
//! request. The terminal loop lives in the `chat_hub_client` binary.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};

/// WebSocket connection to a chat hub server
pub struct Connection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// `host:port` this connection was opened to
    pub server_addr: String,
}

impl Connection {
    /// Open a connection to `host:port`
    pub async fn open(server_addr: &str) -> Result<Self, AppError> {
        let url = format!("ws://{}", server_addr);
        let (ws, _) = connect_async(&url).await?;
        debug!("Connected to {}", url);
        Ok(Self {
            ws,
            server_addr: server_addr.to_string(),
        })
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &ClientMessage) -> Result<ServerMessage, AppError> {
        let json = serde_json::to_string(request)?;
        self.ws.send(Message::Text(json.into())).await?;

        while let Some(msg) = self.ws.next().await {
            match msg? {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(AppError::ConnectionClosed)
    }

    /// Close the WebSocket
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Help text printed for empty lines and unknown commands
pub const HELP: &str = "\
Available commands: start with tilde (~)
    ~connect <host:port> - Connect to a server
    ~quit                - Close connection to the server
    ~join <room>         - Join a room
    ~leave               - Leave the current room
    ~list                - List all users
    ~show                - Display all messages of the current room
    @<user> <message>    - Send a private message to a user
Type anything else and press enter to broadcast to the room (if joined) or to everyone";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `~connect <host:port>`
    Connect(String),
    /// `~quit`
    Quit,
    /// `~join <room>`
    Join(String),
    /// `~leave`
    Leave,
    /// `~list`
    List,
    /// `~show`
    Show,
    /// `@<user> <text>`
    Private { to: String, body: String },
    /// Any other text
    Broadcast(String),
    /// Empty line or unknown `~` command
    Help,
}

impl Command {
    /// Parse a line of input
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Command::Help;
        };

        if let Some(to) = first.strip_prefix('@').filter(|to| !to.is_empty()) {
            let body = words.collect::<Vec<_>>().join(" ");
            return Command::Private {
                to: to.to_string(),
                body,
            };
        }

        if first.starts_with('~') {
            return match (first, words.next()) {
                ("~connect", Some(addr)) => Command::Connect(addr.to_string()),
                ("~join", Some(room)) => Command::Join(room.to_string()),
                ("~quit", _) => Command::Quit,
                ("~leave", _) => Command::Leave,
                ("~list", _) => Command::List,
                ("~show", _) => Command::Show,
                _ => Command::Help,
            };
        }

        Command::Broadcast(line.to_string())
    }

    /// Whether the command needs an open server connection
    pub fn requires_connection(&self) -> bool {
        !matches!(self, Command::Connect(_) | Command::Help)
    }

    /// Request sent on behalf of `user`, for commands that map to one
    pub fn to_request(&self, user: &str) -> Option<ClientMessage> {
        let user = user.to_string();
        let request = match self {
            Command::Quit => ClientMessage::Disconnect { user },
            Command::Join(room) => ClientMessage::Join {
                user,
                room: room.clone(),
            },
            Command::Leave => ClientMessage::Leave { user },
            Command::List => ClientMessage::ListUsers { user },
            Command::Show => ClientMessage::ShowRoomMessages { user },
            Command::Private { to, body } => ClientMessage::Send {
                from: user,
                to: to.clone(),
                body: body.clone(),
            },
            Command::Broadcast(body) => ClientMessage::Send {
                from: user,
                to: String::new(),
                body: body.clone(),
            },
            Command::Connect(_) | Command::Help => return None,
        };
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("~connect 10.0.0.1:1234"),
            Command::Connect("10.0.0.1:1234".to_string())
        );
        assert_eq!(Command::parse("~join lobby"), Command::Join("lobby".to_string()));
        assert_eq!(Command::parse("~leave"), Command::Leave);
        assert_eq!(Command::parse("~list"), Command::List);
        assert_eq!(Command::parse("~show"), Command::Show);
        assert_eq!(Command::parse("  ~quit  "), Command::Quit);
    }

    #[test]
    fn test_parse_help() {
        assert_eq!(Command::parse(""), Command::Help);
        assert_eq!(Command::parse("   "), Command::Help);
        assert_eq!(Command::parse("~join"), Command::Help);
        assert_eq!(Command::parse("~dance"), Command::Help);
    }

    #[test]
    fn test_parse_private_message() {
        assert_eq!(
            Command::parse("@bob  see   you"),
            Command::Private {
                to: "bob".to_string(),
                body: "see you".to_string()
            }
        );
    }

    #[test]
    fn test_lone_at_sign_is_broadcast() {
        assert_eq!(Command::parse("@ hi"), Command::Broadcast("@ hi".to_string()));
    }

    #[test]
    fn test_parse_broadcast_keeps_spacing() {
        assert_eq!(
            Command::parse("hello  there"),
            Command::Broadcast("hello  there".to_string())
        );
    }

    #[test]
    fn test_to_request() {
        assert_eq!(
            Command::Broadcast("hi".to_string()).to_request("alice"),
            Some(ClientMessage::Send {
                from: "alice".to_string(),
                to: String::new(),
                body: "hi".to_string()
            })
        );
        assert_eq!(
            Command::Quit.to_request("alice"),
            Some(ClientMessage::Disconnect {
                user: "alice".to_string()
            })
        );
        assert!(Command::Help.to_request("alice").is_none());
        assert!(!Command::Help.requires_connection());
        assert!(Command::List.requires_connection());
    }
}
