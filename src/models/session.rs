// ABOUTME: Sandbox session model tracking readiness and the inspector handshake
// A session lives from one sandbox (re)load to the next

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub sandbox_ready: bool,
    pub handshake_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            sandbox_ready: false,
            handshake_sent: false,
            created_at: Utc::now(),
        }
    }

    /// Record a `LOADED` signal. Returns true only for the first one of this session.
    pub fn mark_ready(&mut self) -> bool {
        if self.sandbox_ready {
            return false;
        }
        self.sandbox_ready = true;
        true
    }

    /// Record that the handshake went out. Returns false if it was already sent.
    pub fn mark_handshake_sent(&mut self) -> bool {
        if !self.sandbox_ready || self.handshake_sent {
            return false;
        }
        self.handshake_sent = true;
        true
    }
}
