//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! request parsing, and one response per request from the ChatServer.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::HubHandle;
use crate::types::ConnectionId;

/// Connection accept loop
///
/// Spawns a handler task for each accepted connection. Never returns
/// on its own; accept failures are logged and skipped.
pub async fn serve(listener: TcpListener, hub: HubHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let hub = hub.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, hub).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake and answers requests until the peer
/// closes. A user connected through this socket is disconnected when the
/// socket goes away.
pub async fn handle_connection(stream: TcpStream, hub: HubHandle) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    info!("Connection {} opened from {}", conn_id, peer_addr);

    // User registered through this connection, if any
    let mut bound: Option<String> = None;

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let response = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(request) => {
                        debug!("Connection {} request: {:?}", conn_id, request);
                        dispatch(&hub, conn_id, &mut bound, request).await
                    }
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", conn_id, e);
                        AppError::from(e).into()
                    }
                };

                let json = serde_json::to_string(&response)?;
                if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                    debug!("WebSocket send failed for {}: {}", conn_id, e);
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Connection {} sent close frame", conn_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                // Pong is handled automatically by tungstenite
                debug!("Ping from {}", conn_id);
            }
            Ok(_) => {
                // Binary or other message types - ignore
            }
            Err(e) => {
                error!("WebSocket error for {}: {}", conn_id, e);
                break;
            }
        }
    }

    if let Some(user) = bound.take() {
        match hub.release(&user, conn_id).await {
            Ok(true) => info!("Connection {} dropped, disconnected {}", conn_id, user),
            Ok(false) => debug!("{} no longer held by connection {}", user, conn_id),
            Err(e) => debug!("Cleanup disconnect of {} failed: {}", user, e),
        }
    }

    let _ = ws_sender.close().await;
    info!("Connection {} closed", conn_id);

    Ok(())
}

/// Apply one request and build its response
///
/// `bound` tracks the user registered through connection `conn_id`.
/// Connecting while bound first disconnects the bound user, unless some
/// other connection has since freed the name.
pub async fn dispatch(
    hub: &HubHandle,
    conn_id: ConnectionId,
    bound: &mut Option<String>,
    request: ClientMessage,
) -> ServerMessage {
    let result = match request {
        ClientMessage::Connect { user } => {
            if let Some(previous) = bound.take() {
                info!("Reconnect: disconnecting {} first", previous);
                if let Err(e) = hub.release(&previous, conn_id).await {
                    debug!("Disconnect of {} before reconnect failed: {}", previous, e);
                }
            }
            hub.connect_owned(&user, Some(conn_id)).await.map(|()| {
                *bound = Some(user);
                ServerMessage::Ack
            })
        }
        ClientMessage::Disconnect { user } => hub.disconnect(&user).await.map(|()| {
            if bound.as_deref() == Some(user.as_str()) {
                *bound = None;
            }
            ServerMessage::Ack
        }),
        ClientMessage::Join { user, room } => hub
            .join(&user, &room)
            .await
            .map(|lines| ServerMessage::Joined { lines }),
        ClientMessage::Leave { user } => hub
            .leave(&user)
            .await
            .map(|left| ServerMessage::Left { left }),
        ClientMessage::Send { from, to, body } => hub
            .send(&from, &to, &body)
            .await
            .map(|()| ServerMessage::Ack),
        ClientMessage::ListUsers { user } => hub
            .list_users(&user)
            .await
            .map(|lines| ServerMessage::Users { lines }),
        ClientMessage::ShowMessages { user } => hub
            .show_messages(&user)
            .await
            .map(|lines| ServerMessage::Messages { lines }),
        ClientMessage::ShowRoomMessages { user } => hub
            .show_room_messages(&user)
            .await
            .map(|lines| ServerMessage::Messages { lines }),
    };

    result.unwrap_or_else(ServerMessage::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use crate::message::ErrorCode;

    fn connect(user: &str) -> ClientMessage {
        ClientMessage::Connect {
            user: user.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_binds_user() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;

        let response = dispatch(&hub, conn, &mut bound, connect("alice")).await;

        assert_eq!(response, ServerMessage::Ack);
        assert_eq!(bound.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_failed_connect_does_not_bind() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;

        let response = dispatch(&hub, conn, &mut bound, connect("SERVER")).await;

        assert!(matches!(
            response,
            ServerMessage::Error {
                code: ErrorCode::InvalidUser,
                ..
            }
        ));
        assert!(bound.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_disconnects_previous_user() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;
        hub.connect("observer").await.unwrap();

        dispatch(&hub, conn, &mut bound, connect("alice")).await;
        dispatch(&hub, conn, &mut bound, connect("alice2")).await;

        assert_eq!(bound.as_deref(), Some("alice2"));
        assert_eq!(
            hub.list_users("observer").await.unwrap(),
            ["*observer", "alice2"]
        );
        let lines = hub.show_messages("observer").await.unwrap();
        assert!(lines.contains(&"SERVER -> alice removed".to_string()));
    }

    #[tokio::test]
    async fn test_reconnect_keeps_name_taken_by_another_connection() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let stale = ConnectionId::new();
        let mut stale_bound = None;
        dispatch(&hub, stale, &mut stale_bound, connect("alice")).await;

        // Another connection frees the name and a third one takes it.
        hub.disconnect("alice").await.unwrap();
        let current = ConnectionId::new();
        let mut current_bound = None;
        dispatch(&hub, current, &mut current_bound, connect("alice")).await;

        dispatch(&hub, stale, &mut stale_bound, connect("bob")).await;

        assert_eq!(stale_bound.as_deref(), Some("bob"));
        assert_eq!(hub.list_users("alice").await.unwrap(), ["*alice", "bob"]);
    }

    #[tokio::test]
    async fn test_disconnect_unbinds() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;
        dispatch(&hub, conn, &mut bound, connect("alice")).await;

        let response = dispatch(
            &hub,
            conn,
            &mut bound,
            ClientMessage::Disconnect {
                user: "alice".to_string(),
            },
        )
        .await;

        assert_eq!(response, ServerMessage::Ack);
        assert!(bound.is_none());
    }

    #[tokio::test]
    async fn test_send_to_unknown_user_is_error_response() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;
        dispatch(&hub, conn, &mut bound, connect("alice")).await;

        let response = dispatch(
            &hub,
            conn,
            &mut bound,
            ClientMessage::Send {
                from: "alice".to_string(),
                to: "bob".to_string(),
                body: "hi".to_string(),
            },
        )
        .await;

        assert_eq!(
            response,
            ServerMessage::Error {
                code: ErrorCode::DestinationNotFound,
                message: "bob not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_join_and_leave_responses() {
        let hub = HubHandle::spawn(Hub::new(), 16);
        let conn = ConnectionId::new();
        let mut bound = None;
        dispatch(&hub, conn, &mut bound, connect("alice")).await;

        let joined = dispatch(
            &hub,
            conn,
            &mut bound,
            ClientMessage::Join {
                user: "alice".to_string(),
                room: "lobby".to_string(),
            },
        )
        .await;
        assert_eq!(joined, ServerMessage::Joined { lines: vec![] });

        let left = dispatch(
            &hub,
            conn,
            &mut bound,
            ClientMessage::Leave {
                user: "alice".to_string(),
            },
        )
        .await;
        assert_eq!(left, ServerMessage::Left { left: true });
    }
}
