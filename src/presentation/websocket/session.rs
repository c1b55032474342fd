//! WebSocket Session Management

use std::time::{Duration, Instant};

/// Per-connection state owned by the connection task.
#[derive(Debug)]
pub struct SessionState {
    pub user_id: i64,
    pub session_id: String,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(session_id: String, user_id: i64) -> Self {
        Self {
            user_id,
            session_id,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expires_without_heartbeat() {
        let mut state = SessionState::new("s".into(), 1);
        assert!(state.is_alive(Duration::from_secs(60)));

        state.last_heartbeat = Instant::now() - Duration::from_secs(120);
        assert!(!state.is_alive(Duration::from_secs(60)));

        state.heartbeat();
        assert!(state.is_alive(Duration::from_secs(60)));
    }
}
