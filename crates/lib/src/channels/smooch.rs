//! Smooch app-user API (v1.1): send business-side messages and store user properties.

use crate::config::SmoochConfig;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SmoochError {
    #[error("smooch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("smooch api error: {0}")]
    Api(String),
}

/// Operations the bridge needs from the end-user messaging platform.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Deliver text to the end user as coming from the business (role appMaker).
    async fn send_to_user(&self, visitor_id: &str, text: &str) -> Result<(), SmoochError>;

    /// Store one key/value pair in the user's profile properties.
    async fn update_user_property(
        &self,
        visitor_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SmoochError>;
}

/// HTTP client for the Smooch app-user endpoints. Authenticates with the account key (basic auth).
#[derive(Clone)]
pub struct SmoochClient {
    base_url: String,
    app_id: String,
    key_id: String,
    secret: String,
    client: reqwest::Client,
}

impl SmoochClient {
    pub fn new(config: &SmoochConfig) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone().unwrap_or_default(),
            key_id: config.key_id.clone().unwrap_or_default(),
            secret: config.secret.clone().unwrap_or_default(),
            client: reqwest::Client::new(),
        }
    }

    fn app_user_url(&self, visitor_id: &str) -> String {
        format!("{}/v1.1/apps/{}/appusers/{}", self.base_url, self.app_id, visitor_id)
    }
}

async fn check_status(res: reqwest::Response) -> Result<(), SmoochError> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(SmoochError::Api(format!("{} {}", status, body)));
    }
    Ok(())
}

#[async_trait]
impl MessagingApi for SmoochClient {
    async fn send_to_user(&self, visitor_id: &str, text: &str) -> Result<(), SmoochError> {
        let url = format!("{}/messages", self.app_user_url(visitor_id));
        let body = serde_json::json!({ "text": text, "type": "text", "role": "appMaker" });
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.secret))
            .json(&body)
            .send()
            .await?;
        check_status(res).await?;
        log::info!("called sendMessageToSmooch for {}", visitor_id);
        Ok(())
    }

    async fn update_user_property(
        &self,
        visitor_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SmoochError> {
        let mut properties = serde_json::Map::new();
        properties.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        let body = serde_json::json!({ "properties": properties });
        let res = self
            .client
            .put(self.app_user_url(visitor_id))
            .basic_auth(&self.key_id, Some(&self.secret))
            .json(&body)
            .send()
            .await?;
        check_status(res).await?;
        log::info!("called updateSmoochUser ({}) for {}", key, visitor_id);
        Ok(())
    }
}
