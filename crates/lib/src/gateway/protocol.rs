//! Smooch webhook payload types.

use crate::channels::InboundMessage;
use serde::{Deserialize, Serialize};

/// The only trigger the bridge relays.
pub const TRIGGER_APP_USER_MESSAGE: &str = "message:appUser";

/// Webhook body: `{ "trigger", "appUser", "messages": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub app_user: Option<AppUser>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub properties: AppUserProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserProperties {
    #[serde(default)]
    pub last_session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookPayload {
    pub fn is_app_user_message(&self) -> bool {
        self.trigger == TRIGGER_APP_USER_MESSAGE
    }

    /// Collapse the delivery into one inbound message. `None` when there is no app user.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        let user = self.app_user.as_ref()?;
        let text = InboundMessage::join_texts(
            self.messages.iter().map(|m| m.text.as_deref().unwrap_or("")),
        );
        Some(InboundMessage {
            visitor_id: user.id.clone(),
            name: user.name.clone(),
            stored_session_id: user
                .properties
                .last_session_id
                .clone()
                .filter(|s| !s.is_empty()),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_user_message() {
        let body = r#"{
            "trigger": "message:appUser",
            "appUser": {"_id": "u1", "name": "Ada", "properties": {"lastSessionId": "S9"}},
            "messages": [{"text": "hi"}, {"text": "there"}]
        }"#;
        let payload: WebhookPayload = serde_json::from_str(body).unwrap();
        assert!(payload.is_app_user_message());
        let inbound = payload.to_inbound().unwrap();
        assert_eq!(inbound.visitor_id, "u1");
        assert_eq!(inbound.name.as_deref(), Some("Ada"));
        assert_eq!(inbound.stored_session_id.as_deref(), Some("S9"));
        assert_eq!(inbound.text, "hi\nthere");
    }

    #[test]
    fn missing_properties_default() {
        let body = r#"{"trigger":"message:appUser","appUser":{"_id":"u1"},"messages":[{"text":"x"}]}"#;
        let payload: WebhookPayload = serde_json::from_str(body).unwrap();
        let inbound = payload.to_inbound().unwrap();
        assert_eq!(inbound.stored_session_id, None);
        assert_eq!(inbound.name, None);
    }

    #[test]
    fn other_triggers_are_not_messages() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"trigger":"conversation:read"}"#).unwrap();
        assert!(!payload.is_app_user_message());
        assert!(payload.to_inbound().is_none());
    }
}
