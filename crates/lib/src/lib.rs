//! Relay core library: bridges Smooch end-user conversations to LiveChat agents.
//!
//! Inbound webhook deliveries start LiveChat sessions and forward visitor text; a poll
//! worker forwards agent replies back until the conversation goes idle.

pub mod bridge;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod poller;
pub mod queue;
pub mod session;
