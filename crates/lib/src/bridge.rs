//! Inbound relay: end-user text from Smooch into a LiveChat session.
//!
//! Starts a session for every delivery, remembers it on the user's profile and in the
//! registry, schedules the first poll, then forwards the text. A session only stays in the
//! registry while a poll chain exists for it.

use crate::channels::{InboundMessage, LiveChatApi, LiveChatError, MessagingApi, SmoochError};
use crate::config::PollingConfig;
use crate::queue::{JobQueue, PollJob, QueueError};
use crate::session::{OpenOutcome, SessionRegistry};
use std::sync::Arc;

/// Smooch user property that remembers the last LiveChat session across deliveries.
pub const LAST_SESSION_PROPERTY: &str = "lastSessionId";

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    LiveChat(#[from] LiveChatError),
    #[error(transparent)]
    Smooch(#[from] SmoochError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// How an inbound delivery was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Session the text was sent into (`None` when no session was known at all).
    pub session_id: Option<String>,
    /// True when a new poll chain was scheduled for this delivery.
    pub poll_scheduled: bool,
}

/// Shared handles for relaying end-user messages to LiveChat.
pub struct Bridge {
    livechat: Arc<dyn LiveChatApi>,
    messaging: Arc<dyn MessagingApi>,
    sessions: Arc<SessionRegistry>,
    queue: Arc<dyn JobQueue>,
    polling: PollingConfig,
}

impl Bridge {
    pub fn new(
        livechat: Arc<dyn LiveChatApi>,
        messaging: Arc<dyn MessagingApi>,
        sessions: Arc<SessionRegistry>,
        queue: Arc<dyn JobQueue>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            livechat,
            messaging,
            sessions,
            queue,
            polling,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Relay one delivery at time `now_ms`.
    ///
    /// A failed session start is logged and treated as "no new session"; the text then goes
    /// to the registry's active session, else the session stored on the user's profile.
    pub async fn relay_inbound(
        &self,
        msg: &InboundMessage,
        now_ms: i64,
    ) -> Result<RelayReport, BridgeError> {
        let visitor = msg.visitor_id.as_str();
        log::info!("handle smooch webhook for {}", visitor);

        let started = match self.livechat.start_session(visitor, msg.name.as_deref()).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("error starting livechat for {}: {}", visitor, e);
                None
            }
        };

        let mut poll_scheduled = false;
        if let Some(ref session_id) = started {
            self.messaging
                .update_user_property(visitor, LAST_SESSION_PROPERTY, session_id)
                .await?;
            match self.sessions.open(visitor, session_id, now_ms).await {
                OpenOutcome::Opened { replaced } => {
                    if let Some(old) = replaced {
                        log::info!(
                            "visitor {} moved from session {} to {}",
                            visitor,
                            old.secured_session_id,
                            session_id
                        );
                    }
                    let first = PollJob::first(visitor, session_id.as_str(), now_ms);
                    if let Err(e) = self.queue.enqueue(first, self.polling.interval()).await {
                        self.sessions.evict(visitor, session_id).await;
                        return Err(e.into());
                    }
                    poll_scheduled = true;
                }
                OpenOutcome::AlreadyActive => {
                    log::debug!("session for {} already polled, not scheduling another chain", visitor);
                }
            }
        }

        let session_id = match started {
            Some(id) => Some(id),
            None => self
                .sessions
                .active_session_id(visitor)
                .await
                .or_else(|| msg.stored_session_id.clone()),
        };
        if session_id.is_none() {
            log::warn!("no livechat session known for {}, sending anyway", visitor);
        }
        self.livechat
            .send_message(visitor, session_id.as_deref(), &msg.text)
            .await?;

        Ok(RelayReport {
            session_id,
            poll_scheduled,
        })
    }
}
