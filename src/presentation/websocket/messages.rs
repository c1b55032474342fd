//! WebSocket Message Types
//!
//! Every frame is `{op, d, s, t}`; `s` and `t` are only set on dispatches.

use serde::{Deserialize, Serialize};

use crate::application::dto::response::UserResponse;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch
    Dispatch = 0,
    /// Heartbeat
    Heartbeat = 1,
    /// Identify
    Identify = 2,
    /// Join a room
    Subscribe = 3,
    /// Leave a room
    Unsubscribe = 4,
    /// Invalid session
    InvalidSession = 9,
    /// Hello
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u64(op: u64) -> Option<Self> {
        match op {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::Subscribe),
            4 => Some(Self::Unsubscribe),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u64,
    #[serde(default)]
    pub d: Option<serde_json::Value>,
}

/// Outgoing gateway message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    fn op(op: OpCode, d: Option<serde_json::Value>) -> Self {
        Self {
            op: op as u8,
            d,
            s: None,
            t: None,
        }
    }

    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::op(
            OpCode::Hello,
            serde_json::to_value(HelloPayload { heartbeat_interval }).ok(),
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self::op(OpCode::HeartbeatAck, None)
    }

    pub fn invalid_session() -> Self {
        Self::op(OpCode::InvalidSession, Some(serde_json::Value::Bool(false)))
    }

    pub fn dispatch(name: &str, d: serde_json::Value, sequence: u64) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(d),
            s: Some(sequence),
            t: Some(name.to_string()),
        }
    }
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Identify payload (op 2)
#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

/// Subscribe / Unsubscribe payload (op 3 / op 4)
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomPayload {
    pub room: String,
}

/// Ready payload (dispatch READY)
#[derive(Debug, Serialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user: UserResponse,
    pub rooms: Vec<String>,
    pub heartbeat_interval: u64,
}
