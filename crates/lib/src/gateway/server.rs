//! Webhook HTTP server: Smooch deliveries in, poll worker running alongside.

use crate::bridge::Bridge;
use crate::channels::{LiveChatClient, SmoochClient};
use crate::config::Config;
use crate::gateway::protocol::WebhookPayload;
use crate::poller::Poller;
use crate::queue::DelayQueue;
use crate::session::SessionRegistry;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::watch;

/// Header Smooch sends the shared webhook secret in.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub bridge: Arc<Bridge>,
}

/// Compare the provided header value to the configured secret by SHA-256 digest so the
/// comparison does not short-circuit on the first differing byte.
fn secret_matches(provided: Option<&str>, expected: Option<&str>) -> bool {
    let (Some(provided), Some(expected)) = (provided, expected) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Build the router: `GET /` health, `POST /` Smooch webhook.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http).post(smooch_webhook))
        .with_state(state)
}

/// Run the bridge: webhook server plus poll worker. Blocks until shutdown (e.g. Ctrl+C).
/// Refuses to start while required credentials (including the webhook secret) are missing.
pub async fn run_server(config: Config) -> Result<()> {
    let missing = config.missing_settings();
    if !missing.is_empty() {
        anyhow::bail!(
            "refusing to start with missing settings: {} (set them in the config file or environment)",
            missing.join(", ")
        );
    }

    let livechat = Arc::new(LiveChatClient::new(&config.livechat));
    let messaging = Arc::new(SmoochClient::new(&config.smooch));
    let sessions = Arc::new(SessionRegistry::new());
    let (queue, job_rx) = DelayQueue::new();
    let queue = Arc::new(queue);

    let poller = Arc::new(Poller::new(
        livechat.clone(),
        messaging.clone(),
        sessions.clone(),
        queue.clone(),
        config.polling.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = poller.start(job_rx, shutdown_rx);

    let bridge = Arc::new(Bridge::new(
        livechat,
        messaging,
        sessions,
        queue.clone(),
        config.polling.clone(),
    ));
    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let state = GatewayState {
        config: Arc::new(config),
        bridge,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(queue, shutdown_tx))
        .await
        .context("webhook server exited")?;
    let _ = worker.await;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Closes the job queue and tells the poll worker to stop.
async fn shutdown_signal(queue: Arc<DelayQueue>, shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping poll worker");
    queue.close();
    let _ = shutdown_tx.send(true);
}

/// POST / — Smooch webhook. Always answers 200 so Smooch never retries; failures are
/// logged and, for relay errors, echoed in the body.
async fn smooch_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if !secret_matches(provided, state.config.smooch.webhook_secret.as_deref()) {
        log::warn!("smooch webhook event failed validation at {}", now_ms);
        return (StatusCode::OK, String::new());
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("unreadable smooch webhook body at {}: {}", now_ms, e);
            return (StatusCode::OK, String::new());
        }
    };
    if !payload.is_app_user_message() {
        log::info!("ignoring non message:appUser webhook trigger {:?}", payload.trigger);
        return (StatusCode::OK, String::new());
    }
    let Some(inbound) = payload.to_inbound() else {
        log::warn!("message:appUser webhook without appUser at {}", now_ms);
        return (StatusCode::OK, String::new());
    };

    match state.bridge.relay_inbound(&inbound, now_ms).await {
        Ok(_) => (StatusCode::OK, String::new()),
        Err(e) => {
            log::error!("error receiving smooch webhook for {}: {}", inbound.visitor_id, e);
            (StatusCode::OK, e.to_string())
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let active_sessions = state.bridge.sessions().len().await;
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
        "activeSessions": active_sessions,
    }))
}
