//! Chat Hub Client - Entry Point
//!
//! Reads commands from stdin, sends them to the server and polls the
//! user's mailbox on a fixed interval.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::time;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use chat_hub::client::HELP;
use chat_hub::{AppError, ClientMessage, Command, Connection, ServerMessage};

/// Mailbox poll period
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Client state: who we are and where we are connected
struct Session {
    user: String,
    room: Option<String>,
    connection: Option<Connection>,
}

impl Session {
    fn new(user: String) -> Self {
        Self {
            user,
            room: None,
            connection: None,
        }
    }

    /// Disconnect from the current server, if any
    async fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            println!("Already disconnected!!");
            return;
        };

        let request = ClientMessage::Disconnect {
            user: self.user.clone(),
        };
        match connection.request(&request).await {
            Ok(response) => print_response(&response),
            Err(e) => warn!("Disconnect failed: {}", e),
        }
        connection.close().await;
        self.room = None;
    }

    /// Connect to `server_addr`, disconnecting from any previous server first
    async fn connect(&mut self, server_addr: &str) {
        if self.connection.is_some() {
            self.disconnect().await;
        }

        let mut connection = match Connection::open(server_addr).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Error establishing connection with {}: {}", server_addr, e);
                return;
            }
        };

        let request = ClientMessage::Connect {
            user: self.user.clone(),
        };
        match connection.request(&request).await {
            Ok(ServerMessage::Ack) => {
                println!(
                    "Client Info:\n\tuser: {}\n\troom: {}\n\tserver: {}",
                    self.user,
                    self.room.as_deref().unwrap_or(""),
                    connection.server_addr
                );
                self.connection = Some(connection);
            }
            Ok(response) => {
                print_response(&response);
                connection.close().await;
            }
            Err(e) => error!("Connect failed: {}", e),
        }
    }

    /// Handle one line of input
    async fn handle_line(&mut self, line: &str) {
        let command = Command::parse(line);

        if command.requires_connection() && self.connection.is_none() {
            println!("Connect to a server first!!");
            return;
        }

        match &command {
            Command::Help => println!("{}", HELP),
            Command::Connect(addr) => self.connect(addr).await,
            Command::Quit => self.disconnect().await,
            _ => {
                if let Some(request) = command.to_request(&self.user) {
                    match self.send(&request).await {
                        Ok(response) => self.apply(&command, &response),
                        Err(e) => error!("Request failed: {}", e),
                    }
                }
            }
        }
    }

    /// Update local state from a response and print it
    fn apply(&mut self, command: &Command, response: &ServerMessage) {
        match (command, response) {
            (Command::Join(room), ServerMessage::Joined { lines }) => {
                self.room = Some(room.clone());
                if !lines.is_empty() {
                    println!("Recent messages of room {}:\n{}", room, lines.join("\n"));
                }
            }
            (Command::Leave, ServerMessage::Left { left }) => {
                if *left {
                    self.room = None;
                } else {
                    println!("{} did not join any room", self.user);
                }
            }
            (Command::List, ServerMessage::Users { lines }) => {
                println!("Current users:\n{}", lines.join("\n"));
            }
            (Command::Show, ServerMessage::Messages { lines }) => {
                if lines.is_empty() {
                    println!("No message found");
                } else {
                    println!("All messages of current room:\n{}", lines.join("\n"));
                }
            }
            (_, response) => print_response(response),
        }
    }

    /// Fetch and print undelivered messages
    async fn poll(&mut self) {
        let request = ClientMessage::ShowMessages {
            user: self.user.clone(),
        };
        match self.send(&request).await {
            Ok(ServerMessage::Messages { lines }) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Ok(response) => debug!("Unexpected poll response: {:?}", response),
            Err(e) => {
                error!("Lost connection: {}", e);
                self.connection = None;
                self.room = None;
            }
        }
    }

    async fn send(&mut self, request: &ClientMessage) -> Result<ServerMessage, AppError> {
        match self.connection.as_mut() {
            Some(connection) => connection.request(request).await,
            None => Err(AppError::ConnectionClosed),
        }
    }
}

/// Print errors; successful acks are silent
fn print_response(response: &ServerMessage) {
    match response {
        ServerMessage::Ack => {}
        ServerMessage::Error { message, .. } => println!("Error: {}", message),
        other => debug!("Response: {:?}", other),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut args = env::args().skip(1);
    let Some(user) = args.next() else {
        eprintln!("Usage: chat_hub_client <user> [host:port]");
        return ExitCode::FAILURE;
    };

    let mut session = Session::new(user);
    if let Some(addr) = args.next() {
        session.connect(&addr).await;
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut ticker = time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => session.handle_line(&line).await,
                Ok(None) => break,
                Err(e) => error!("Error reading input: {}", e),
            },
            _ = ticker.tick() => {
                if session.connection.is_some() {
                    session.poll().await;
                }
            }
        }
    }

    if session.connection.is_some() {
        session.disconnect().await;
    }
    ExitCode::SUCCESS
}
