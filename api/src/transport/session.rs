use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Lifecycle of one transport session. Each state has its own handle type;
/// `Closed` is reached by dropping the active handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
}

struct SessionEntry {
    inbox: mpsc::UnboundedSender<Value>,
    connected_at: DateTime<Utc>,
}

/// Live keyed sessions, by id. The lock is never held across an await.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id. Nothing is routable until the session is activated.
    pub fn connect(self: &Arc<Self>) -> PendingSession {
        PendingSession {
            id: Uuid::now_v7().simple().to_string(),
            store: Arc::clone(self),
        }
    }

    /// Queue one message for the session's stream. A session whose stream
    /// has already gone away is dropped and reported as not found.
    pub fn forward(&self, id: &str, message: Value) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let entry = sessions.get(id).ok_or(SessionError::NotFound)?;
        if entry.inbox.send(message).is_err() {
            sessions.remove(id);
            return Err(SessionError::NotFound);
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, id: String, entry: SessionEntry) {
        self.lock().insert(id, entry);
    }

    fn remove(&self, id: &str) -> Option<SessionEntry> {
        self.lock().remove(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A session whose id has been issued but whose channel is not yet open.
pub struct PendingSession {
    id: String,
    store: Arc<SessionStore>,
}

impl PendingSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::Connecting
    }

    /// Open the channel and make the id routable.
    pub fn activate(self) -> (ActiveSession, mpsc::UnboundedReceiver<Value>) {
        let (inbox, receiver) = mpsc::unbounded_channel();
        let connected_at = Utc::now();
        self.store.insert(
            self.id.clone(),
            SessionEntry {
                inbox,
                connected_at,
            },
        );

        tracing::info!(
            event = "mcp_session_opened",
            session_id = %self.id,
            active_sessions = self.store.len(),
            "MCP session opened"
        );

        (
            ActiveSession {
                id: self.id,
                store: self.store,
            },
            receiver,
        )
    }
}

/// Routable session. Dropping it closes the session and removes the entry.
pub struct ActiveSession {
    id: String,
    store: Arc<SessionStore>,
}

impl ActiveSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::Active
    }

    pub fn close(self) -> SessionState {
        drop(self);
        SessionState::Closed
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        let entry = self.store.remove(&self.id);
        let connected_for_ms = entry
            .map(|entry| (Utc::now() - entry.connected_at).num_milliseconds())
            .unwrap_or_default();
        tracing::info!(
            event = "mcp_session_closed",
            session_id = %self.id,
            connected_for_ms,
            "MCP session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_id_is_not_found() {
        let store = Arc::new(SessionStore::new());
        assert_eq!(
            store.forward("never-issued", json!({})),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn pending_session_is_not_routable() {
        let store = Arc::new(SessionStore::new());
        let pending = store.connect();
        assert_eq!(pending.state(), SessionState::Connecting);
        assert!(!store.contains(pending.id()));
        assert_eq!(
            store.forward(pending.id(), json!({})),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn closed_session_is_removed_and_not_found() {
        let store = Arc::new(SessionStore::new());
        let (session, _inbox) = store.connect().activate();
        let id = session.id().to_string();
        assert_eq!(session.state(), SessionState::Active);
        assert!(store.contains(&id));

        assert_eq!(session.close(), SessionState::Closed);
        assert!(store.is_empty());
        assert_eq!(store.forward(&id, json!({})), Err(SessionError::NotFound));
    }

    #[test]
    fn dropped_receiver_evicts_session_on_forward() {
        let store = Arc::new(SessionStore::new());
        let (session, inbox) = store.connect().activate();
        let id = session.id().to_string();
        drop(inbox);

        assert_eq!(store.forward(&id, json!({})), Err(SessionError::NotFound));
        assert!(!store.contains(&id));
        drop(session);
    }

    #[tokio::test]
    async fn rapid_forwards_arrive_once_each_in_order() {
        let store = Arc::new(SessionStore::new());
        let (session, mut inbox) = store.connect().activate();

        store.forward(session.id(), json!({ "id": 1 })).unwrap();
        store.forward(session.id(), json!({ "id": 2 })).unwrap();

        assert_eq!(inbox.recv().await, Some(json!({ "id": 1 })));
        assert_eq!(inbox.recv().await, Some(json!({ "id": 2 })));
        assert!(inbox.try_recv().is_err());
    }

    #[test]
    fn ids_are_unique() {
        let store = Arc::new(SessionStore::new());
        let a = store.connect();
        let b = store.connect();
        assert_ne!(a.id(), b.id());
    }
}
