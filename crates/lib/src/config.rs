//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Environment variables win over the file so the bridge can run from env alone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const REDACTED: &str = "********";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Smooch (end-user messaging) credentials.
    #[serde(default)]
    pub smooch: SmoochConfig,

    /// LiveChat (agent side) credentials.
    #[serde(default)]
    pub livechat: LiveChatConfig,

    /// Poll pacing and conversation timeout.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Bind address and port for the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP (default 8000). Overridden by PORT env.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"). Overridden by RELAY_BIND env.
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    8000
}

fn default_server_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Smooch account credentials and the shared webhook secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmoochConfig {
    #[serde(default = "default_smooch_api_base")]
    pub api_base: String,
    /// Account key id. Overridden by SMOOCH_ACCOUNT_KEY_ID env.
    pub key_id: Option<String>,
    /// Account secret. Overridden by SMOOCH_ACCOUNT_SECRET env.
    pub secret: Option<String>,
    /// Overridden by SMOOCH_APP_ID env.
    pub app_id: Option<String>,
    /// Expected value of the `x-api-key` header on webhook calls. Overridden by SMOOCH_WEBHOOK_SECRET env.
    pub webhook_secret: Option<String>,
}

fn default_smooch_api_base() -> String {
    "https://api.smooch.io".to_string()
}

impl Default for SmoochConfig {
    fn default() -> Self {
        Self {
            api_base: default_smooch_api_base(),
            key_id: None,
            secret: None,
            app_id: None,
            webhook_secret: None,
        }
    }
}

/// LiveChat licence and API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatConfig {
    #[serde(default = "default_livechat_api_base")]
    pub api_base: String,
    /// Overridden by LIVECHAT_LICENCE_ID env.
    pub licence_id: Option<String>,
    /// Login email for basic auth. Overridden by LIVECHAT_EMAIL env.
    pub email: Option<String>,
    /// API key for basic auth. Overridden by LIVECHAT_KEY env.
    pub key: Option<String>,
    /// Sent when a chat starts; agents see it, the end user does not.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

fn default_livechat_api_base() -> String {
    "https://api.livechatinc.com".to_string()
}

fn default_welcome_message() -> String {
    "chat started".to_string()
}

impl Default for LiveChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_livechat_api_base(),
            licence_id: None,
            email: None,
            key: None,
            welcome_message: default_welcome_message(),
        }
    }
}

/// Poll pacing: delay between polls, idle timeout, and redelivery attempts for failed polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_conversation_timeout_ms")]
    pub conversation_timeout_ms: u64,
    /// Total runs of one poll job before it is dropped (1 = no redelivery).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_conversation_timeout_ms() -> u64 {
    300_000
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            conversation_timeout_ms: default_conversation_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup` (env var name -> value). Empty or blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => log::warn!("ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(bind) = get("RELAY_BIND") {
            self.server.bind = bind;
        }
        let smooch = &mut self.smooch;
        override_opt(&mut smooch.key_id, get("SMOOCH_ACCOUNT_KEY_ID"));
        override_opt(&mut smooch.secret, get("SMOOCH_ACCOUNT_SECRET"));
        override_opt(&mut smooch.app_id, get("SMOOCH_APP_ID"));
        override_opt(&mut smooch.webhook_secret, get("SMOOCH_WEBHOOK_SECRET"));
        let livechat = &mut self.livechat;
        override_opt(&mut livechat.licence_id, get("LIVECHAT_LICENCE_ID"));
        override_opt(&mut livechat.email, get("LIVECHAT_EMAIL"));
        override_opt(&mut livechat.key, get("LIVECHAT_KEY"));
    }

    /// Names of required settings that are unset or blank.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let required = [
            ("smooch.keyId", &self.smooch.key_id),
            ("smooch.secret", &self.smooch.secret),
            ("smooch.appId", &self.smooch.app_id),
            ("smooch.webhookSecret", &self.smooch.webhook_secret),
            ("livechat.licenceId", &self.livechat.licence_id),
            ("livechat.email", &self.livechat.email),
            ("livechat.key", &self.livechat.key),
        ];
        required
            .into_iter()
            .filter(|(_, v)| v.as_deref().map(str::trim).unwrap_or("").is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Copy with secrets masked, for printing.
    pub fn redacted(&self) -> Config {
        let mut c = self.clone();
        for secret in [
            &mut c.smooch.secret,
            &mut c.smooch.webhook_secret,
            &mut c.livechat.key,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        c
    }
}

fn override_opt(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default path), then apply env overrides.
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    config.apply_env();
    Ok((config, path))
}
