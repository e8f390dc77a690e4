//! Conversation sessions: which LiveChat session each visitor is currently talking through.
//!
//! The registry is shared by the webhook handler (opens sessions) and the poll worker
//! (records agent activity, evicts on timeout). One active session per visitor.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Visitor identifier (Smooch app user id, reused as the LiveChat visitor id).
pub type VisitorId = String;

/// A visitor's active LiveChat session and how far its agent feed has been forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub visitor_id: VisitorId,
    pub secured_session_id: String,
    /// Cursor into the agent message feed; `None` until the first agent message.
    pub last_message_id: Option<i64>,
    /// Milliseconds since the epoch of the last forwarded message (or the session start).
    pub last_message_timestamp: i64,
}

/// Result of opening a session for a visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The session is now active. `replaced` is the visitor's previous session, if any.
    Opened { replaced: Option<ConversationSession> },
    /// The visitor was already on this session; nothing changed.
    AlreadyActive,
}

/// In-memory registry: visitor id -> active session.
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<VisitorId, ConversationSession>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Make `session_id` the visitor's active session, starting its clock at `now_ms`.
    pub async fn open(&self, visitor_id: &str, session_id: &str, now_ms: i64) -> OpenOutcome {
        let mut g = self.inner.write().await;
        if let Some(current) = g.get(visitor_id) {
            if current.secured_session_id == session_id {
                return OpenOutcome::AlreadyActive;
            }
        }
        let session = ConversationSession {
            visitor_id: visitor_id.to_string(),
            secured_session_id: session_id.to_string(),
            last_message_id: None,
            last_message_timestamp: now_ms,
        };
        let replaced = g.insert(visitor_id.to_string(), session);
        OpenOutcome::Opened { replaced }
    }

    pub async fn get(&self, visitor_id: &str) -> Option<ConversationSession> {
        self.inner.read().await.get(visitor_id).cloned()
    }

    pub async fn active_session_id(&self, visitor_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .get(visitor_id)
            .map(|s| s.secured_session_id.clone())
    }

    /// True if `session_id` is the visitor's active session.
    pub async fn is_active(&self, visitor_id: &str, session_id: &str) -> bool {
        self.inner
            .read()
            .await
            .get(visitor_id)
            .is_some_and(|s| s.secured_session_id == session_id)
    }

    /// Record forwarded agent messages. Ignored unless `session_id` is still active.
    /// The cursor never moves backwards.
    pub async fn record_activity(
        &self,
        visitor_id: &str,
        session_id: &str,
        cursor: Option<i64>,
        now_ms: i64,
    ) -> bool {
        let mut g = self.inner.write().await;
        match g.get_mut(visitor_id) {
            Some(s) if s.secured_session_id == session_id => {
                s.last_message_id = s.last_message_id.max(cursor);
                s.last_message_timestamp = s.last_message_timestamp.max(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Remove the visitor's entry if it still refers to `session_id`.
    pub async fn evict(&self, visitor_id: &str, session_id: &str) -> Option<ConversationSession> {
        let mut g = self.inner.write().await;
        if g.get(visitor_id)?.secured_session_id != session_id {
            return None;
        }
        g.remove(visitor_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
