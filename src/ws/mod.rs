pub mod handlers;
pub mod rooms;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{authenticate, extract_token, Session};
use crate::error::{PollError, PollResult, TOKEN_EXPIRED};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use handlers::{broadcast_update, RoomUpdate};
use rooms::{connection_channel, ConnectionId, ConnectionSender};

/// Close codes sent when a connection is refused
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;
pub const CLOSE_POLL_NOT_FOUND: u16 = 4004;
/// Standard "internal error" close code
const CLOSE_INTERNAL: u16 = 1011;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Close code for a connection refused with `err`.
pub fn close_code(err: &PollError) -> u16 {
    match err {
        PollError::Unauthorized(msg) if msg == TOKEN_EXPIRED => CLOSE_TOKEN_EXPIRED,
        PollError::Unauthorized(_) | PollError::Validation(_) => CLOSE_TOKEN_INVALID,
        PollError::NotFound(_) => CLOSE_POLL_NOT_FOUND,
        PollError::Conflict(_) | PollError::Internal(_) => CLOSE_INTERNAL,
    }
}

/// GET /ws?token=JWT
///
/// The token may also come from `Authorization: Bearer` or a `token` header.
/// Failed authentication still upgrades, then sends one `exception` and closes,
/// since browsers cannot read the status of a refused upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let token = extract_token(params.token.as_deref(), &headers);

    match authenticate(&state.keys, token.as_deref()) {
        Ok(session) => {
            tracing::info!(
                poll_id = %session.poll_id,
                user_id = %session.user_id,
                name = %session.name,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, session, state))
        }
        Err(err) => {
            tracing::warn!(close_code = close_code(&err), error = %err, "WebSocket auth failed");
            ws.on_upgrade(move |socket| async move {
                let (mut sender, _receiver) = socket.split();
                refuse(&mut sender, err).await;
            })
        }
    }
}

/// Join the poll's room and register the participant. On success the refreshed
/// snapshot goes to the whole room, the new connection included.
pub async fn on_connect(
    state: &AppState,
    session: &Session,
    sender: ConnectionSender,
) -> PollResult<ConnectionId> {
    let conn_id = state.rooms.join(&session.poll_id, sender);

    match state
        .add_participant(&session.poll_id, &session.user_id, &session.name)
        .await
    {
        Ok(poll) => {
            broadcast_update(state, &session.poll_id, RoomUpdate::Snapshot(poll));
            Ok(conn_id)
        }
        Err(e) => {
            tracing::warn!(poll_id = %session.poll_id, error = %e, "Cannot join poll");
            state.rooms.leave(&session.poll_id, conn_id);
            Err(e)
        }
    }
}

/// Leave the room and drop the participant if the poll is still Open. The room
/// only hears about it when a live poll actually changed.
pub async fn on_disconnect(state: &AppState, session: &Session, conn_id: ConnectionId) {
    let remaining = state.rooms.leave(&session.poll_id, conn_id);
    tracing::info!(
        poll_id = %session.poll_id,
        user_id = %session.user_id,
        room_size = remaining,
        "WebSocket connection closed"
    );

    if let Some(poll) = state.disconnect(&session.poll_id, &session.user_id).await {
        broadcast_update(state, &session.poll_id, RoomUpdate::Snapshot(poll));
    }
}

/// Send the error envelope, then close with the matching code.
async fn refuse(sender: &mut SplitSink<WebSocket, Message>, err: PollError) {
    let code = close_code(&err);
    let reason = err.to_string();
    let _ = send_json(sender, &ServerMessage::from(err)).await;
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

/// Drive one authenticated connection from join to disconnect.
async fn handle_socket(socket: WebSocket, session: Session, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Broadcasts and private replies share this queue, so the client sees them
    // in the order they were produced. The room holds the only sender.
    let (tx, mut rx) = connection_channel();
    let conn_id = match on_connect(&state, &session, tx).await {
        Ok(conn_id) => conn_id,
        Err(e) => {
            refuse(&mut sender, e).await;
            return;
        }
    };

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(msg) = outbound else {
                    tracing::info!(poll_id = %session.poll_id, conn_id, "Connection dropped from room");
                    break;
                };
                if let Err(e) = send_json(&mut sender, &msg).await {
                    tracing::debug!(error = %e, "Failed to send to client");
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(poll_id = %session.poll_id, "Received message: {}", text.as_str());

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &session, &state).await,
                            Err(e) => Some(ServerMessage::from(PollError::Validation(format!(
                                "Invalid message format: {}",
                                e
                            )))),
                        };

                        if let Some(reply) = reply {
                            state.rooms.send_to(&session.poll_id, conn_id, reply);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(poll_id = %session.poll_id, "WebSocket closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    on_disconnect(&state, &session, conn_id).await;
}
