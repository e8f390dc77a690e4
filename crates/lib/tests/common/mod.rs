//! In-memory fakes for the platform clients and the job queue.
#![allow(dead_code)]

use async_trait::async_trait;
use relay::channels::{
    digest_events, LiveChatApi, LiveChatError, LiveChatEvent, MessagingApi, PendingMessages,
    SmoochError,
};
use relay::config::PollingConfig;
use relay::queue::{JobQueue, PollJob, QueueError};
use relay::session::SessionRegistry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveChatCall {
    Start { visitor: String, name: Option<String> },
    Send { visitor: String, session: Option<String>, text: String },
    Close { visitor: String, session: String },
    Fetch { visitor: String, session: String, since: Option<i64> },
}

/// LiveChat fake: scripted start result, scripted event batches, call log.
#[derive(Default)]
pub struct FakeLiveChat {
    pub calls: Mutex<Vec<LiveChatCall>>,
    pub start_result: Mutex<Option<Result<Option<String>, String>>>,
    pub event_batches: Mutex<VecDeque<Vec<LiveChatEvent>>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_close: Mutex<bool>,
    /// When set, the next fetch makes the visitor switch to this session in the registry.
    pub replace_on_fetch: Mutex<Option<(Arc<SessionRegistry>, String)>>,
}

impl FakeLiveChat {
    pub fn starting(session_id: &str) -> Self {
        let fake = Self::default();
        *fake.start_result.lock().unwrap() = Some(Ok(Some(session_id.to_string())));
        fake
    }

    pub fn failing_start() -> Self {
        let fake = Self::default();
        *fake.start_result.lock().unwrap() = Some(Err("503 unavailable".to_string()));
        fake
    }

    pub fn push_events(&self, events: Vec<LiveChatEvent>) {
        self.event_batches.lock().unwrap().push_back(events);
    }

    pub fn calls(&self) -> Vec<LiveChatCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LiveChatApi for FakeLiveChat {
    async fn start_session(
        &self,
        visitor_id: &str,
        name: Option<&str>,
    ) -> Result<Option<String>, LiveChatError> {
        self.calls.lock().unwrap().push(LiveChatCall::Start {
            visitor: visitor_id.to_string(),
            name: name.map(str::to_string),
        });
        match self.start_result.lock().unwrap().clone() {
            Some(Ok(id)) => Ok(id),
            Some(Err(e)) => Err(LiveChatError::Api(e)),
            None => Ok(None),
        }
    }

    async fn send_message(
        &self,
        visitor_id: &str,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<(), LiveChatError> {
        self.calls.lock().unwrap().push(LiveChatCall::Send {
            visitor: visitor_id.to_string(),
            session: session_id.map(str::to_string),
            text: text.to_string(),
        });
        match session_id {
            Some(_) => Ok(()),
            None => Err(LiveChatError::Api("400 missing secured_session_id".to_string())),
        }
    }

    async fn close_session(&self, visitor_id: &str, session_id: &str) -> Result<(), LiveChatError> {
        self.calls.lock().unwrap().push(LiveChatCall::Close {
            visitor: visitor_id.to_string(),
            session: session_id.to_string(),
        });
        if *self.fail_close.lock().unwrap() {
            return Err(LiveChatError::Api("500 close failed".to_string()));
        }
        Ok(())
    }

    async fn fetch_pending_messages(
        &self,
        visitor_id: &str,
        session_id: &str,
        since: Option<i64>,
    ) -> Result<PendingMessages, LiveChatError> {
        self.calls.lock().unwrap().push(LiveChatCall::Fetch {
            visitor: visitor_id.to_string(),
            session: session_id.to_string(),
            since,
        });
        if *self.fail_fetch.lock().unwrap() {
            return Err(LiveChatError::Api("500 boom".to_string()));
        }
        let replacement = self.replace_on_fetch.lock().unwrap().take();
        if let Some((sessions, newer)) = replacement {
            sessions.open(visitor_id, &newer, 0).await;
        }
        let events = self.event_batches.lock().unwrap().pop_front().unwrap_or_default();
        Ok(digest_events(&events, since))
    }
}

/// Smooch fake: records messages and property updates; can be told to fail sends.
#[derive(Default)]
pub struct FakeMessaging {
    pub sent: Mutex<Vec<(String, String)>>,
    pub properties: Mutex<Vec<(String, String, String)>>,
    pub fail_send: Mutex<bool>,
    pub fail_property: Mutex<bool>,
}

impl FakeMessaging {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn properties(&self) -> Vec<(String, String, String)> {
        self.properties.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingApi for FakeMessaging {
    async fn send_to_user(&self, visitor_id: &str, text: &str) -> Result<(), SmoochError> {
        if *self.fail_send.lock().unwrap() {
            return Err(SmoochError::Api("502 bad gateway".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((visitor_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn update_user_property(
        &self,
        visitor_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SmoochError> {
        if *self.fail_property.lock().unwrap() {
            return Err(SmoochError::Api("503 properties unavailable".to_string()));
        }
        self.properties.lock().unwrap().push((
            visitor_id.to_string(),
            key.to_string(),
            value.to_string(),
        ));
        Ok(())
    }
}

/// Queue that only records what was scheduled. Rejects jobs while `closed` is set.
#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<(PollJob, Duration)>>,
    pub closed: Mutex<bool>,
}

impl RecordingQueue {
    pub fn jobs(&self) -> Vec<(PollJob, Duration)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: PollJob, delay: Duration) -> Result<(), QueueError> {
        if *self.closed.lock().unwrap() {
            return Err(QueueError::Closed);
        }
        self.jobs.lock().unwrap().push((job, delay));
        Ok(())
    }
}

pub fn agent_message(text: &str, id: i64) -> LiveChatEvent {
    event("message", "agent", text, id)
}

pub fn visitor_message(text: &str, id: i64) -> LiveChatEvent {
    event("message", "visitor", text, id)
}

pub fn event(kind: &str, user_type: &str, text: &str, id: i64) -> LiveChatEvent {
    LiveChatEvent {
        kind: kind.to_string(),
        user_type: user_type.to_string(),
        text: Some(text.to_string()),
        message_id: Some(id),
    }
}

pub fn polling() -> PollingConfig {
    PollingConfig::default()
}
