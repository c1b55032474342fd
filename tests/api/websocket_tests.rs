//! WebSocket Gateway Tests

use axum::http::StatusCode;
use axum_test::{TestServer, TestWebSocket};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{workspace, TestApp, TestUser};

async fn connect(server: &TestServer) -> TestWebSocket {
    server.get_websocket("/ws").await.into_websocket().await
}

/// Complete Hello and Identify, returning the READY payload
async fn identify(socket: &mut TestWebSocket, user: &TestUser) -> Value {
    let hello: Value = socket.receive_json().await;
    assert_eq!(hello["op"], 10);
    assert!(hello["d"]["heartbeat_interval"].as_u64().is_some());

    socket
        .send_json(&json!({"op": 2, "d": {"token": user.access_token}}))
        .await;
    let ready: Value = socket.receive_json().await;
    assert_eq!(ready["op"], 0);
    assert_eq!(ready["t"], "READY");
    ready["d"].clone()
}

async fn subscribe(socket: &mut TestWebSocket, room: &str) -> Value {
    socket.send_json(&json!({"op": 3, "d": {"room": room}})).await;
    socket.receive_json().await
}

/// Next dispatch named `name`, skipping other events
async fn next_named(socket: &mut TestWebSocket, name: &str) -> Value {
    for _ in 0..10 {
        let frame: Value = socket.receive_json().await;
        if frame["t"] == name {
            return frame["d"].clone();
        }
    }
    panic!("no {} dispatch received", name);
}

#[tokio::test]
async fn test_ready_lists_personal_and_team_rooms() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let server = app.socket_server();

    let mut socket = connect(&server).await;
    let ready = identify(&mut socket, &ws.owner).await;

    assert_eq!(ready["user"]["id"], ws.owner.id.as_str());
    let rooms: Vec<&str> = ready["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        rooms,
        vec![format!("user:{}", ws.owner.id), format!("team:{}", ws.team_id)]
    );
}

#[tokio::test]
async fn test_bad_token_invalidates_session() {
    let app = TestApp::new();
    let server = app.socket_server();

    let mut socket = connect(&server).await;
    let hello: Value = socket.receive_json().await;
    assert_eq!(hello["op"], 10);

    socket.send_json(&json!({"op": 2, "d": {"token": "garbage"}})).await;
    let frame: Value = socket.receive_json().await;
    assert_eq!(frame["op"], 9);
}

#[tokio::test]
async fn test_identify_timeout_invalidates_session() {
    let app = TestApp::with_settings(|s| s.websocket.identify_timeout_secs = 1);
    let server = app.socket_server();

    let mut socket = connect(&server).await;
    let hello: Value = socket.receive_json().await;
    assert_eq!(hello["op"], 10);

    // Stay silent past the identify window
    let frame: Value = socket.receive_json().await;
    assert_eq!(frame["op"], 9);
}

#[tokio::test]
async fn test_subscribe_follows_project_access() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let outsider = app.register().await;
    let server = app.socket_server();
    let project_room = format!("project:{}", ws.project_id);

    let mut owner_socket = connect(&server).await;
    identify(&mut owner_socket, &ws.owner).await;
    let joined = subscribe(&mut owner_socket, &project_room).await;
    assert_eq!(joined["t"], "ROOM_JOINED");
    assert_eq!(joined["d"]["room"], project_room.as_str());

    let mut outsider_socket = connect(&server).await;
    identify(&mut outsider_socket, &outsider).await;
    let denied = subscribe(&mut outsider_socket, &project_room).await;
    assert_eq!(denied["t"], "ROOM_DENIED");
    assert_eq!(denied["d"], json!({"room": project_room, "reason": "forbidden"}));

    let denied = subscribe(&mut outsider_socket, "board:1").await;
    assert_eq!(denied["d"]["reason"], "invalid room");
}

#[tokio::test]
async fn test_personal_room_cannot_be_left() {
    let app = TestApp::new();
    let user = app.register().await;
    let server = app.socket_server();

    let mut socket = connect(&server).await;
    identify(&mut socket, &user).await;

    socket
        .send_json(&json!({"op": 4, "d": {"room": format!("user:{}", user.id)}}))
        .await;
    // No ROOM_LEFT is sent, so the next frame answers the following request
    let frame = subscribe(&mut socket, "board:1").await;
    assert_eq!(frame["t"], "ROOM_DENIED");
}

#[tokio::test]
async fn test_removed_member_is_evicted_from_team_and_project_rooms() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let member = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &member).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({"user_id": member.id, "role": "viewer"}))
        .await
        .assert_status(StatusCode::CREATED);

    let server = app.socket_server();
    let mut socket = connect(&server).await;
    identify(&mut socket, &member).await;
    let project_room = format!("project:{}", ws.project_id);
    assert_eq!(subscribe(&mut socket, &project_room).await["t"], "ROOM_JOINED");

    app.server
        .delete(&format!("/api/teams/{}/members/{}", ws.team_id, member.id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let mut left = Vec::new();
    for _ in 0..2 {
        let room = next_named(&mut socket, "ROOM_LEFT").await;
        left.push(room["room"].as_str().unwrap().to_string());
    }
    left.sort();
    let mut expected = vec![project_room, format!("team:{}", ws.team_id)];
    expected.sort();
    assert_eq!(left, expected);
}
