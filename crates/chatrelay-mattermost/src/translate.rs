//! Turning accepted inbound events into relay messages.

use crate::avatar::AvatarCache;
use crate::event::{self, NativeEvent};
use crate::webhook::IncomingMessage;
use chatrelay_core::{Event, Message};
use std::sync::Arc;

/// Protocol name stamped on every translated message.
pub const PROTOCOL: &str = "mattermost";

/// Strip `/me` markup: text wrapped in `*` loses every asterisk.
///
/// Returns the new text and whether it was an action.
pub fn replace_action(text: &str) -> (String, bool) {
    if text.starts_with('*') && text.ends_with('*') {
        (text.replace('*', ""), true)
    } else {
        (text.to_string(), false)
    }
}

/// Builds relay messages from inbound events.
#[derive(Debug, Clone)]
pub struct Translator {
    account: String,
    edit_suffix: String,
    media_server: Option<String>,
    avatars: Arc<AvatarCache>,
}

impl Translator {
    /// Create a translator.
    pub fn new(
        account: impl Into<String>,
        edit_suffix: impl Into<String>,
        media_server: Option<String>,
        avatars: Arc<AvatarCache>,
    ) -> Self {
        Self {
            account: account.into(),
            edit_suffix: edit_suffix.into(),
            media_server: media_server.filter(|s| !s.is_empty()),
            avatars,
        }
    }

    fn base(&self, username: &str, user_id: &str, channel: &str, text: &str) -> Message {
        let mut msg = Message::new(username, text, channel).with_account(self.account.clone());
        msg.user_id = user_id.to_string();
        msg.protocol = PROTOCOL.to_string();
        if let Some(server) = &self.media_server {
            if let Some(url) = self.avatars.avatar_url(user_id, server) {
                msg.avatar = url;
            }
        }
        msg
    }

    /// Translate a session event that passed the inbound filter.
    pub fn from_event(&self, ev: &dyn NativeEvent) -> Message {
        let mut msg = self.base(ev.username(), ev.user_id(), ev.channel(), ev.text());

        if let Some(post) = ev.post() {
            msg.id = post.id.to_string();
            msg.parent_id = post.root_id.to_string();
        }

        match ev.event_kind() {
            event::EVENT_POST_DELETED => {
                msg.event = Event::MsgDelete;
                msg.text = Event::MsgDelete.as_str().to_string();
                return msg;
            }
            event::EVENT_POST_EDITED if !self.edit_suffix.is_empty() => {
                msg.text.push_str(&self.edit_suffix);
            }
            _ => {}
        }

        if ev.post_type() == event::POST_TYPE_HEADER_CHANGE {
            msg.event = Event::TopicChange;
            return msg;
        }

        let (text, is_action) = replace_action(&msg.text);
        if is_action {
            msg.text = text;
            msg.event = Event::UserAction;
        }
        msg
    }

    /// Translate an outgoing-webhook post.
    pub fn from_webhook(&self, incoming: &IncomingMessage) -> Message {
        let mut msg = self.base(
            &incoming.user_name,
            &incoming.user_id,
            &incoming.channel_name,
            &incoming.text,
        );
        msg.id = incoming.post_id.clone();
        msg
    }
}
