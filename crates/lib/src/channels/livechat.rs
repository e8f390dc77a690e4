//! LiveChat visitor API (v2): start, send_message, close, get_pending_messages.
//!
//! The bridge acts as the visitor on the LiveChat side; agents answer in their own console
//! and the pending-messages feed is polled for their replies.

use crate::config::LiveChatConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_VERSION_HEADER: &str = "X-API-VERSION";
const API_VERSION: &str = "2";

#[derive(Debug, thiserror::Error)]
pub enum LiveChatError {
    #[error("livechat request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("livechat api error: {0}")]
    Api(String),
}

/// Operations the bridge needs from LiveChat.
#[async_trait]
pub trait LiveChatApi: Send + Sync {
    /// Start a chat for the visitor. `Ok(None)` when the API answered without a session id.
    async fn start_session(
        &self,
        visitor_id: &str,
        name: Option<&str>,
    ) -> Result<Option<String>, LiveChatError>;

    /// Post visitor text into the chat. A missing session id is still sent; the API rejects it.
    async fn send_message(
        &self,
        visitor_id: &str,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<(), LiveChatError>;

    async fn close_session(&self, visitor_id: &str, session_id: &str) -> Result<(), LiveChatError>;

    /// Fetch agent text posted after `since` and the cursor for the next fetch.
    async fn fetch_pending_messages(
        &self,
        visitor_id: &str,
        session_id: &str,
        since: Option<i64>,
    ) -> Result<PendingMessages, LiveChatError>;
}

/// One event from get_pending_messages. Unknown or missing fields default so a partial
/// event never fails the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveChatEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message_id: Option<i64>,
}

impl LiveChatEvent {
    fn is_agent_message(&self) -> bool {
        self.kind == "message" && self.user_type == "agent"
    }
}

#[derive(Debug, Default, Deserialize)]
struct PendingMessagesResponse {
    #[serde(default)]
    events: Vec<LiveChatEvent>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    secured_session_id: Option<String>,
}

/// Digest of one pending-messages fetch: agent text (empty when nothing new) and next cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMessages {
    pub text: String,
    pub last_message_id: Option<i64>,
}

impl PendingMessages {
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Reduce a batch of events to forwardable agent text and the next cursor.
///
/// Only agent `message` events are kept, and any whose id is below `since` has already been
/// forwarded and is dropped. The cursor is one past the highest id seen (or past `since`),
/// so the next fetch starts after everything in this batch.
pub fn digest_events(events: &[LiveChatEvent], since: Option<i64>) -> PendingMessages {
    let text = events
        .iter()
        .filter(|e| e.is_agent_message())
        .filter(|e| match (e.message_id, since) {
            (Some(id), Some(cursor)) => id >= cursor,
            _ => true,
        })
        .filter_map(|e| e.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let last_message_id = events
        .iter()
        .filter_map(|e| e.message_id)
        .chain(since)
        .max()
        .map(|id| id + 1);
    PendingMessages {
        text,
        last_message_id,
    }
}

/// HTTP client for the LiveChat visitor API.
#[derive(Clone)]
pub struct LiveChatClient {
    base_url: String,
    licence_id: String,
    email: String,
    key: String,
    welcome_message: String,
    client: reqwest::Client,
}

impl LiveChatClient {
    pub fn new(config: &LiveChatConfig) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            licence_id: config.licence_id.clone().unwrap_or_default(),
            email: config.email.clone().unwrap_or_default(),
            key: config.key.clone().unwrap_or_default(),
            welcome_message: config.welcome_message.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn chat_url(&self, visitor_id: &str, action: &str) -> String {
        format!("{}/visitors/{}/chat/{}", self.base_url, visitor_id, action)
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<reqwest::Response, LiveChatError> {
        let res = self
            .client
            .post(url)
            .basic_auth(&self.email, Some(&self.key))
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
            .send()
            .await?;
        check_status(res).await
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, LiveChatError> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(LiveChatError::Api(format!("{} {}", status, body)));
    }
    Ok(res)
}

#[async_trait]
impl LiveChatApi for LiveChatClient {
    /// POST /visitors/{id}/chat/start
    async fn start_session(
        &self,
        visitor_id: &str,
        name: Option<&str>,
    ) -> Result<Option<String>, LiveChatError> {
        let body = serde_json::json!({
            "name": name,
            "visitor_id": visitor_id,
            "licence_id": self.licence_id,
            "welcome_message": self.welcome_message,
        });
        let res = self.post(&self.chat_url(visitor_id, "start"), body).await?;
        let data: StartResponse = res.json().await?;
        log::info!("called startLiveChat for {}", visitor_id);
        Ok(data.secured_session_id.filter(|s| !s.is_empty()))
    }

    /// POST /visitors/{id}/chat/send_message
    async fn send_message(
        &self,
        visitor_id: &str,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<(), LiveChatError> {
        let body = serde_json::json!({
            "secured_session_id": session_id,
            "licence_id": self.licence_id,
            "visitor_id": visitor_id,
            "message": text,
        });
        self.post(&self.chat_url(visitor_id, "send_message"), body).await?;
        log::info!("called sendMessageToLiveChat for {}", visitor_id);
        Ok(())
    }

    /// POST /visitors/{id}/chat/close
    async fn close_session(&self, visitor_id: &str, session_id: &str) -> Result<(), LiveChatError> {
        let body = serde_json::json!({
            "secured_session_id": session_id,
            "licence_id": self.licence_id,
        });
        self.post(&self.chat_url(visitor_id, "close"), body).await?;
        log::info!("called closeLiveChat for {}", visitor_id);
        Ok(())
    }

    /// GET /visitors/{id}/chat/get_pending_messages
    async fn fetch_pending_messages(
        &self,
        visitor_id: &str,
        session_id: &str,
        since: Option<i64>,
    ) -> Result<PendingMessages, LiveChatError> {
        let mut query = vec![
            ("licence_id", self.licence_id.clone()),
            ("secured_session_id", session_id.to_string()),
        ];
        if let Some(id) = since {
            query.push(("last_message_id", id.to_string()));
        }
        let res = self
            .client
            .get(self.chat_url(visitor_id, "get_pending_messages"))
            .basic_auth(&self.email, Some(&self.key))
            .header(API_VERSION_HEADER, API_VERSION)
            .query(&query)
            .send()
            .await?;
        let res = check_status(res).await?;
        let body = res.text().await?;
        let data = match serde_json::from_str::<PendingMessagesResponse>(&body) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("livechat pending messages for {} unreadable ({}), treating as empty", visitor_id, e);
                PendingMessagesResponse::default()
            }
        };
        log::info!("called getLiveChatMessages for {}", visitor_id);
        Ok(digest_events(&data.events, since))
    }
}
