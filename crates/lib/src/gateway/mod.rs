//! Gateway: the HTTP surface of the bridge.
//!
//! One port serves the Smooch webhook (`POST /`) and a health probe (`GET /`).
//! The poll worker is started and stopped together with the server.

mod protocol;
mod server;

pub use protocol::{AppUser, AppUserProperties, WebhookMessage, WebhookPayload, TRIGGER_APP_USER_MESSAGE};
pub use server::{router, run_server, GatewayState, API_KEY_HEADER};
