//! WebSocket Gateway
//!
//! Tracks live sessions and the rooms they joined, and fans events out to
//! them. Implements [`EventBroadcaster`] for the services.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use super::messages::GatewaySend;
use crate::application::realtime::{EventBroadcaster, RealtimeEvent, Room};
use crate::config::WebSocketSettings;
use crate::infrastructure::metrics;

/// Connected session with message sender
pub struct ConnectedSession {
    pub user_id: i64,
    pub session_id: String,
    sender: mpsc::UnboundedSender<GatewaySend>,
    sequence: AtomicU64,
    /// Joined rooms, each with the rooms its grant depends on
    rooms: Mutex<HashMap<Room, Vec<Room>>>,
    closed: Arc<Notify>,
}

impl ConnectedSession {
    /// Send a dispatch stamped with this session's next sequence number.
    fn dispatch(&self, name: &str, d: serde_json::Value) -> bool {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.sender
            .send(GatewaySend::dispatch(name, d, sequence))
            .is_ok()
    }

    /// Remove and return the rooms in `revoked` or joined through one of them.
    fn take_rooms(&self, revoked: &[Room]) -> Vec<Room> {
        let mut rooms = self.rooms.lock();
        let dropped: Vec<Room> = rooms
            .iter()
            .filter(|(room, via)| {
                revoked.contains(room) || via.iter().any(|r| revoked.contains(r))
            })
            .map(|(room, _)| *room)
            .collect();
        for room in &dropped {
            rooms.remove(room);
        }
        dropped
    }
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Active sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// User ID to session IDs mapping (one user can have multiple sessions)
    user_sessions: DashMap<i64, Vec<String>>,
    /// Room to session IDs mapping
    room_sessions: DashMap<Room, HashSet<String>>,
    /// Open sockets, identified or not
    connections: AtomicU64,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new(settings: &WebSocketSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
            connections: AtomicU64::new(0),
            heartbeat_interval_ms: settings.heartbeat_interval_ms,
        }
    }

    /// Get the heartbeat interval
    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.report();
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
        self.report();
    }

    fn report(&self) {
        metrics::set_websocket_connections(
            self.connections.load(Ordering::Relaxed) as i64,
            self.sessions.len() as i64,
        );
    }

    /// Register an identified session in `rooms`.
    ///
    /// Returns `true` when this is the user's first live session.
    pub fn register_session(
        &self,
        session_id: String,
        user_id: i64,
        rooms: Vec<Room>,
        sender: mpsc::UnboundedSender<GatewaySend>,
    ) -> bool {
        let session = Arc::new(ConnectedSession {
            user_id,
            session_id: session_id.clone(),
            sender,
            sequence: AtomicU64::new(0),
            rooms: Mutex::new(rooms.iter().map(|room| (*room, Vec::new())).collect()),
            closed: Arc::new(Notify::new()),
        });
        self.sessions.insert(session_id.clone(), session);

        for room in rooms {
            self.room_sessions
                .entry(room)
                .or_default()
                .insert(session_id.clone());
        }

        let first = {
            let mut sessions = self.user_sessions.entry(user_id).or_default();
            sessions.push(session_id.clone());
            sessions.len() == 1
        };

        self.report();
        tracing::info!(user_id, session_id = %session_id, "Session registered");
        first
    }

    /// Remove a session from every room.
    ///
    /// Returns the user id and whether that was the user's last session.
    pub fn unregister_session(&self, session_id: &str) -> Option<(i64, bool)> {
        let (_, session) = self.sessions.remove(session_id)?;

        let rooms: Vec<Room> = session.rooms.lock().drain().map(|(room, _)| room).collect();
        for room in rooms {
            self.remove_from_room(room, session_id);
        }

        let last = match self.user_sessions.get_mut(&session.user_id) {
            Some(mut sessions) => {
                sessions.retain(|s| s != session_id);
                sessions.is_empty()
            }
            None => true,
        };
        if last {
            self.user_sessions
                .remove_if(&session.user_id, |_, sessions| sessions.is_empty());
        }

        self.report();
        tracing::info!(
            user_id = session.user_id,
            session_id = %session_id,
            "Session unregistered"
        );
        Some((session.user_id, last))
    }

    fn remove_from_room(&self, room: Room, session_id: &str) {
        if let Some(mut members) = self.room_sessions.get_mut(&room) {
            members.remove(session_id);
        }
        self.room_sessions.remove_if(&room, |_, members| members.is_empty());
    }

    /// Add a room subscription granted through `via`. Returns `false` for
    /// unknown sessions.
    pub fn join_room(&self, session_id: &str, room: Room, via: Vec<Room>) -> bool {
        let Some(session) = self.sessions.get(session_id).map(|s| s.clone()) else {
            return false;
        };
        session.rooms.lock().insert(room, via);
        self.room_sessions
            .entry(room)
            .or_default()
            .insert(session_id.to_string());
        true
    }

    /// Drop a room subscription. Returns whether the session was in the room.
    pub fn leave_room(&self, session_id: &str, room: Room) -> bool {
        let Some(session) = self.sessions.get(session_id).map(|s| s.clone()) else {
            return false;
        };
        let was_member = session.rooms.lock().remove(&room).is_some();
        if was_member {
            self.remove_from_room(room, session_id);
        }
        was_member
    }

    /// Rooms a session is currently in.
    pub fn session_rooms(&self, session_id: &str) -> Vec<Room> {
        self.sessions
            .get(session_id)
            .map(|s| s.rooms.lock().keys().copied().collect())
            .unwrap_or_default()
    }

    /// Resolves once the session has been ended by [`EventBroadcaster::disconnect_user`].
    pub fn closed_signal(&self, session_id: &str) -> Option<Arc<Notify>> {
        self.sessions.get(session_id).map(|s| s.closed.clone())
    }

    fn sessions_of(&self, user_id: i64) -> Vec<Arc<ConnectedSession>> {
        let ids: Vec<String> = self
            .user_sessions
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.clone()))
            .collect()
    }

    /// Drop `session` from the revoked rooms and tell the client which it left.
    fn evict(&self, session: &ConnectedSession, revoked: &[Room]) {
        for room in session.take_rooms(revoked) {
            self.remove_from_room(room, &session.session_id);
            session.dispatch("ROOM_LEFT", serde_json::json!({ "room": room.to_string() }));
        }
    }

    /// Send a dispatch to one session.
    pub fn dispatch_to_session(&self, session_id: &str, name: &str, d: serde_json::Value) -> bool {
        match self.sessions.get(session_id).map(|s| s.clone()) {
            Some(session) => session.dispatch(name, d),
            None => false,
        }
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if user is online (has at least one session)
    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }
}

impl EventBroadcaster for Gateway {
    fn publish(&self, rooms: &[Room], event: RealtimeEvent) {
        // Collect first so each session gets the event once
        let mut targets: HashSet<String> = HashSet::new();
        for room in rooms {
            if let Some(members) = self.room_sessions.get(room) {
                targets.extend(members.iter().cloned());
            }
        }
        if targets.is_empty() {
            return;
        }

        let name = event.name();
        let payload = event.payload();
        let sessions: Vec<Arc<ConnectedSession>> = targets
            .iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.clone()))
            .collect();
        for session in sessions {
            if !session.dispatch(name, payload.clone()) {
                tracing::debug!(session_id = %session.session_id, event = name, "Dropped event for closed session");
            }
        }
        tracing::trace!(event = name, recipients = targets.len(), "Event published");
    }

    fn online_users(&self, user_ids: &[i64]) -> Vec<i64> {
        user_ids
            .iter()
            .copied()
            .filter(|id| self.is_user_online(*id))
            .collect()
    }

    fn revoke(&self, user_id: i64, rooms: &[Room]) {
        for session in self.sessions_of(user_id) {
            self.evict(&session, rooms);
        }
        tracing::debug!(user_id, rooms = rooms.len(), "Room access revoked");
    }

    fn close_rooms(&self, rooms: &[Room]) {
        let sessions: Vec<Arc<ConnectedSession>> =
            self.sessions.iter().map(|s| s.value().clone()).collect();
        for session in sessions {
            self.evict(&session, rooms);
        }
    }

    fn disconnect_user(&self, user_id: i64) {
        for session in self.sessions_of(user_id) {
            let rooms: Vec<Room> = session.rooms.lock().drain().map(|(room, _)| room).collect();
            for room in rooms {
                self.remove_from_room(room, &session.session_id);
            }
            let _ = session.sender.send(GatewaySend::invalid_session());
            session.closed.notify_one();
        }
        tracing::info!(user_id, "User sessions disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::realtime::DeletedRef;
    use pretty_assertions::assert_eq;

    fn gateway() -> Gateway {
        Gateway::new(&WebSocketSettings {
            max_message_size: 1 << 16,
            max_frame_size: 1 << 16,
            heartbeat_interval_ms: 30000,
            heartbeat_grace_ms: 10000,
            identify_timeout_secs: 10,
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<GatewaySend>) -> Vec<GatewaySend> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_publish_reaches_each_session_once() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![Room::User(1), Room::Team(5)], tx);
        gateway.join_room("a", Room::Project(7), vec![Room::Team(5)]);

        gateway.publish(
            &[Room::Team(5), Room::Project(7)],
            RealtimeEvent::TaskDeleted(DeletedRef::new(3, Some(7))),
        );

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].t.as_deref(), Some("TASK_DELETED"));
        assert_eq!(frames[0].s, Some(1));
    }

    #[test]
    fn test_sequence_is_per_session() {
        let gateway = gateway();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![Room::Task(9)], tx_a);
        gateway.dispatch_to_session("a", "READY", serde_json::json!({}));
        gateway.register_session("b".into(), 2, vec![Room::Task(9)], tx_b);

        gateway.publish(&[Room::Task(9)], RealtimeEvent::TaskDeleted(DeletedRef::new(9, None)));

        let a: Vec<_> = drain(&mut rx_a).into_iter().map(|f| f.s).collect();
        let b: Vec<_> = drain(&mut rx_b).into_iter().map(|f| f.s).collect();
        assert_eq!(a, vec![Some(1), Some(2)]);
        assert_eq!(b, vec![Some(1)]);
    }

    #[test]
    fn test_leave_room_stops_delivery() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![], tx);
        assert!(gateway.join_room("a", Room::Task(4), vec![]));
        assert!(gateway.leave_room("a", Room::Task(4)));
        assert!(!gateway.leave_room("a", Room::Task(4)));

        gateway.publish(&[Room::Task(4)], RealtimeEvent::TaskDeleted(DeletedRef::new(4, None)));
        assert!(drain(&mut rx).is_empty());
        assert!(gateway.session_rooms("a").is_empty());
    }

    #[test]
    fn test_presence_tracks_first_and_last_session() {
        let gateway = gateway();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(gateway.register_session("a".into(), 1, vec![], tx1));
        assert!(!gateway.register_session("b".into(), 1, vec![], tx2));
        assert_eq!(gateway.online_users(&[1, 2]), vec![1]);

        assert_eq!(gateway.unregister_session("a"), Some((1, false)));
        assert!(gateway.is_user_online(1));
        assert_eq!(gateway.unregister_session("b"), Some((1, true)));
        assert!(!gateway.is_user_online(1));
        assert_eq!(gateway.unregister_session("b"), None);
        assert_eq!(gateway.session_count(), 0);
    }

    #[test]
    fn test_revoke_drops_rooms_joined_through_the_revoked_room() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 3, vec![Room::User(3), Room::Team(5)], tx);
        gateway.join_room("a", Room::Project(7), vec![Room::Team(5)]);
        gateway.join_room("a", Room::Task(9), vec![Room::Team(5), Room::Project(7)]);
        gateway.join_room("a", Room::Project(8), vec![Room::Team(6)]);

        gateway.revoke(3, &[Room::Team(5)]);

        let mut rooms = gateway.session_rooms("a");
        rooms.sort_by_key(|r| r.to_string());
        assert_eq!(rooms, vec![Room::Project(8), Room::User(3)]);
        let left: Vec<_> = drain(&mut rx).into_iter().filter_map(|f| f.t).collect();
        assert_eq!(left, vec!["ROOM_LEFT"; 3]);

        gateway.publish(
            &[Room::Team(5), Room::Project(7), Room::Task(9)],
            RealtimeEvent::TaskDeleted(DeletedRef::new(9, Some(7))),
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_revoke_only_touches_that_user() {
        let gateway = gateway();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![], tx_a);
        gateway.register_session("b".into(), 2, vec![], tx_b);
        gateway.join_room("a", Room::Project(7), vec![Room::Team(5)]);
        gateway.join_room("b", Room::Project(7), vec![Room::Team(5)]);

        gateway.revoke(1, &[Room::Project(7)]);

        assert!(gateway.session_rooms("a").is_empty());
        gateway.publish(&[Room::Project(7)], RealtimeEvent::TaskDeleted(DeletedRef::new(1, Some(7))));
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_close_rooms_evicts_every_session() {
        let gateway = gateway();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![Room::Team(5)], tx_a);
        gateway.register_session("b".into(), 2, vec![Room::User(2)], tx_b);
        gateway.join_room("b", Room::Task(9), vec![Room::Team(5), Room::Project(7)]);

        gateway.close_rooms(&[Room::Project(7)]);
        assert_eq!(gateway.session_rooms("a"), vec![Room::Team(5)]);
        assert_eq!(gateway.session_rooms("b"), vec![Room::User(2)]);

        gateway.close_rooms(&[Room::Team(5)]);
        assert!(gateway.session_rooms("a").is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_user_signals_session_end() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.register_session("a".into(), 1, vec![Room::User(1), Room::Team(5)], tx);
        let closed = gateway.closed_signal("a").unwrap();

        gateway.disconnect_user(1);

        // The permit is stored even though nobody was waiting yet
        closed.notified().await;
        assert!(gateway.session_rooms("a").is_empty());
        let frames = drain(&mut rx);
        assert_eq!(frames.last().map(|f| f.op), Some(9));
    }
}
