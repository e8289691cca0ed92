//! Session persistence seam.
//!
//! The agent loop hands each finished exchange to a [`SessionStore`].
//! Real deployments back this with a database; [`InMemorySessionStore`]
//! covers tests and embedders that keep history themselves.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::SessionError;
use crate::message::Message;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist one user turn and the assistant's final answer.
    async fn append_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<(), SessionError>;

    /// Stored history for a session, oldest first.
    async fn history(&self, session_id: &str) -> Result<Vec<Message>, SessionError>;
}

/// Session store that keeps everything in a map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages for a session.
    pub fn message_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(Message::user(user_message));
        history.push(Message::assistant(assistant_message));
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[tokio::test]
    async fn exchanges_are_appended_in_order() {
        let store = InMemorySessionStore::new();
        store.append_exchange("s1", "hi", "hello").await.unwrap();
        store.append_exchange("s1", "again", "sure").await.unwrap();

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[3].text(), "sure");
        assert_eq!(store.message_count("other"), 0);
    }
}
