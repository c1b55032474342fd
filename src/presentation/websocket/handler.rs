//! WebSocket Connection Handler
//!
//! Lifecycle of one socket: Hello, Identify (with timeout), READY, then a
//! loop over client frames and heartbeat checks until the socket closes.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use uuid::Uuid;

use super::messages::{
    GatewayReceive, GatewaySend, IdentifyPayload, OpCode, ReadyPayload, RoomPayload,
};
use super::session::SessionState;
use crate::application::dto::response::UserResponse;
use crate::application::realtime::{EventBroadcaster, PresenceEvent, PresenceStatus, RealtimeEvent, Room};
use crate::application::services::access;
use crate::domain::User;
use crate::startup::AppState;

type Receiver = futures::stream::SplitStream<WebSocket>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(session_id = %session_id, "New WebSocket connection");
    state.gateway.connection_opened();

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewaySend>();

    // Forward queued frames to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let _ = tx.send(GatewaySend::hello(state.gateway.heartbeat_interval()));

    let identify_timeout = Duration::from_secs(state.settings.websocket.identify_timeout_secs);
    let user = match timeout(identify_timeout, wait_for_identify(&mut receiver, &state)).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            tracing::debug!(session_id = %session_id, "Identify failed or connection closed");
            let _ = tx.send(GatewaySend::invalid_session());
            None
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Identify timeout");
            let _ = tx.send(GatewaySend::invalid_session());
            None
        }
    };

    if let Some(user) = user {
        run_session(&session_id, user, &mut receiver, &tx, &state).await;
    }

    // Dropping the last sender lets the forwarder flush and close
    drop(tx);
    let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;
    state.gateway.connection_closed();
}

/// Read frames until a valid Identify arrives. `None` on close or a bad token.
async fn wait_for_identify(receiver: &mut Receiver, state: &AppState) -> Option<User> {
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => continue,
        };
        let Ok(frame) = serde_json::from_str::<GatewayReceive>(&text) else {
            continue;
        };
        if OpCode::from_u64(frame.op) != Some(OpCode::Identify) {
            continue;
        }
        let identify = frame
            .d
            .and_then(|d| serde_json::from_value::<IdentifyPayload>(d).ok())?;
        return match state.auth.authenticate_token(&identify.token).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Identify rejected");
                None
            }
        };
    }
    None
}

/// Rooms every session of `user_id` joins on identify.
async fn initial_rooms(state: &AppState, user_id: i64) -> Vec<Room> {
    let mut rooms = vec![Room::User(user_id)];
    match state.repos.teams.list_for_user(user_id).await {
        Ok(teams) => rooms.extend(teams.iter().map(|t| Room::Team(t.id))),
        Err(e) => tracing::warn!(user_id, error = %e, "Failed to load teams for socket"),
    }
    rooms
}

fn publish_presence(state: &AppState, user_id: i64, rooms: &[Room], status: PresenceStatus) {
    let team_rooms: Vec<Room> = rooms
        .iter()
        .copied()
        .filter(|r| matches!(r, Room::Team(_)))
        .collect();
    state.gateway.publish(
        &team_rooms,
        RealtimeEvent::PresenceUpdate(PresenceEvent {
            user_id: user_id.to_string(),
            status,
        }),
    );
}

async fn run_session(
    session_id: &str,
    user: User,
    receiver: &mut Receiver,
    tx: &mpsc::UnboundedSender<GatewaySend>,
    state: &AppState,
) {
    let user_id = user.id;
    let rooms = initial_rooms(state, user_id).await;
    let came_online =
        state
            .gateway
            .register_session(session_id.to_string(), user_id, rooms.clone(), tx.clone());

    let ready = ReadyPayload {
        session_id: session_id.to_string(),
        user: UserResponse::from_user(user, true),
        rooms: rooms.iter().map(Room::to_string).collect(),
        heartbeat_interval: state.gateway.heartbeat_interval(),
    };
    let ready = serde_json::to_value(ready).unwrap_or_default();
    state.gateway.dispatch_to_session(session_id, "READY", ready);

    if came_online {
        publish_presence(state, user_id, &rooms, PresenceStatus::Online);
    }
    tracing::info!(user_id, session_id = %session_id, "User connected and identified");

    let mut session_state = SessionState::new(session_id.to_string(), user_id);
    let Some(closed) = state.gateway.closed_signal(session_id) else {
        return;
    };
    let mut kicked = false;
    let heartbeat_interval_ms = state.gateway.heartbeat_interval();
    let allowed_silence =
        Duration::from_millis(heartbeat_interval_ms + state.settings.websocket.heartbeat_grace_ms);
    let mut heartbeat_check = interval(Duration::from_millis(heartbeat_interval_ms.max(100)));
    heartbeat_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat_check.tick().await;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_message(&text, &mut session_state, tx, state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    // Pings are answered by axum
                    _ => {}
                }
            }

            _ = heartbeat_check.tick() => {
                if !session_state.is_alive(allowed_silence) {
                    tracing::info!(session_id = %session_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }

            _ = closed.notified() => {
                tracing::info!(session_id = %session_id, "Session ended by the server");
                kicked = true;
                break;
            }
        }
    }

    // A server-ended session has already left its rooms
    let session_rooms = if kicked {
        initial_rooms(state, user_id).await
    } else {
        state.gateway.session_rooms(session_id)
    };
    if let Some((_, went_offline)) = state.gateway.unregister_session(session_id) {
        if went_offline {
            publish_presence(state, user_id, &session_rooms, PresenceStatus::Offline);
            if let Err(e) = state.repos.users.touch_last_seen(user_id, Utc::now()).await {
                tracing::warn!(user_id, error = %e, "Failed to record last seen");
            }
        }
    }
    tracing::info!(user_id, session_id = %session_id, "User disconnected");
}

/// Handle one client frame after identify.
async fn handle_message(
    text: &str,
    session_state: &mut SessionState,
    tx: &mpsc::UnboundedSender<GatewaySend>,
    state: &AppState,
) {
    let frame = match serde_json::from_str::<GatewayReceive>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(session_id = %session_state.session_id, error = %e, "Invalid frame");
            return;
        }
    };

    match OpCode::from_u64(frame.op) {
        Some(OpCode::Heartbeat) => {
            session_state.heartbeat();
            let _ = tx.send(GatewaySend::heartbeat_ack());
        }
        Some(op @ (OpCode::Subscribe | OpCode::Unsubscribe)) => {
            let Some(payload) = frame
                .d
                .and_then(|d| serde_json::from_value::<RoomPayload>(d).ok())
            else {
                tracing::debug!(session_id = %session_state.session_id, "Room frame without room");
                return;
            };
            if op == OpCode::Subscribe {
                subscribe(session_state, payload.room, state).await;
            } else {
                unsubscribe(session_state, payload.room, state);
            }
        }
        _ => {
            tracing::debug!(session_id = %session_state.session_id, op = frame.op, "Unknown opcode");
        }
    }
}

async fn subscribe(session_state: &SessionState, raw_room: String, state: &AppState) {
    let session_id = &session_state.session_id;
    let deny = |reason: &str| {
        state.gateway.dispatch_to_session(
            session_id,
            "ROOM_DENIED",
            json!({"room": raw_room, "reason": reason}),
        );
    };

    let room = match raw_room.parse::<Room>() {
        Ok(room) => room,
        Err(_) => return deny("invalid room"),
    };

    match access::authorize_room(&state.repos, room, session_state.user_id).await {
        Ok(Some(via)) => {
            state.gateway.join_room(session_id, room, via);
            state
                .gateway
                .dispatch_to_session(session_id, "ROOM_JOINED", json!({"room": room.to_string()}));
        }
        Ok(None) => deny("forbidden"),
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Room authorization failed");
            deny("unavailable");
        }
    }
}

fn unsubscribe(session_state: &SessionState, raw_room: String, state: &AppState) {
    let Ok(room) = raw_room.parse::<Room>() else {
        return;
    };
    // The personal room is fixed for the session's lifetime
    if room == Room::User(session_state.user_id) {
        return;
    }
    state.gateway.leave_room(&session_state.session_id, room);
    state.gateway.dispatch_to_session(
        &session_state.session_id,
        "ROOM_LEFT",
        json!({"room": room.to_string()}),
    );
}
