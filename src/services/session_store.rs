//! In-memory chat session store.
//!
//! Sessions expire after an inactivity TTL; expiry is enforced lazily on
//! access, with `cleanup_expired` available for periodic sweeps. Within one
//! session, messages appended by a request are visible to the next request
//! on the same session.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{ChatTurn, MessageRole, Session};

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self { sessions: DashMap::new(), ttl: Duration::hours(ttl_hours) }
    }

    fn is_expired(&self, session: &Session) -> bool {
        Utc::now() - session.last_activity > self.ttl
    }

    /// Return the id of an existing live session, or create a fresh one.
    pub fn get_or_create(&self, session_id: Option<&str>) -> String {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.get(id) {
                if !self.is_expired(&session) {
                    return id.to_string();
                }
            }
            // Expired or unknown id: drop any stale entry and start over
            self.sessions.remove(id);
        }

        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Session::new(id.clone()));
        id
    }

    pub fn append(&self, session_id: &str, role: MessageRole, content: &str, sql: Option<String>) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.add_message(role, content.to_string(), sql);
        }
    }

    /// Last `max_messages` turns as role/content pairs for LLM context.
    pub fn history(&self, session_id: &str, max_messages: usize) -> Vec<ChatTurn> {
        let Some(session) = self.sessions.get(session_id) else {
            return Vec::new();
        };
        if self.is_expired(&session) {
            return Vec::new();
        }

        let messages = &session.messages;
        let start = messages.len().saturating_sub(max_messages);
        messages[start..]
            .iter()
            .map(|m| ChatTurn::new(m.role.as_str(), m.content.clone()))
            .collect()
    }

    /// Remove expired sessions. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| Utc::now() - session.last_activity <= self.ttl);
        before - self.sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
