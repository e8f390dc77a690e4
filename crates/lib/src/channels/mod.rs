//! External chat platforms: LiveChat (agents) and Smooch (end users).
//!
//! Each platform is reached through a trait so the bridge and poller can run against
//! fakes in tests. Inbound end-user messages are normalized into `InboundMessage`.

mod inbound;
mod livechat;
mod smooch;

pub use inbound::InboundMessage;
pub use livechat::{
    digest_events, LiveChatApi, LiveChatClient, LiveChatError, LiveChatEvent, PendingMessages,
};
pub use smooch::{MessagingApi, SmoochClient, SmoochError};
