//! Channel header notifications.

use crate::error::BridgeError;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static HEADER_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<username>[\w\s]+)\s?updated the channel header from:\s?(?P<topicold>.*)\sto:\s?(?P<topicnew>.*)$",
    )
    .expect("invalid regex")
});

/// A parsed header change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChange {
    /// Who changed the header.
    pub username: String,
    /// Previous header, trimmed.
    pub old: String,
    /// New header, trimmed.
    pub new: String,
}

/// Parse a `<user> updated the channel header from: <old> to: <new>` notice.
pub fn extract_topic(text: &str) -> Result<TopicChange> {
    let caps = HEADER_CHANGE
        .captures(text)
        .ok_or_else(|| BridgeError::MalformedTopic(text.to_string()))?;

    let group = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();
    let change = TopicChange {
        username: group("username").trim().to_string(),
        old: group("topicold").trim().to_string(),
        new: group("topicnew").trim().to_string(),
    };

    debug!("extracted old topic '{}' and new topic '{}'", change.old, change.new);
    Ok(change)
}

/// Header text as it is applied to the channel: trailing spaces removed,
/// everything else verbatim.
pub fn header_text(text: &str) -> &str {
    text.trim_end_matches(' ')
}
