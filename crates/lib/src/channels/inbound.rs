//! Inbound end-user message: one webhook delivery collapsed into a single text for LiveChat.

/// Messages from one end user, ready to be relayed to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub visitor_id: String,
    pub name: Option<String>,
    /// Session id remembered on the user's profile by an earlier delivery.
    pub stored_session_id: Option<String>,
    pub text: String,
}

impl InboundMessage {
    /// Join message texts in delivery order, one per line.
    pub fn join_texts<'a, I>(texts: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts.into_iter().collect::<Vec<_>>().join("\n")
    }
}
