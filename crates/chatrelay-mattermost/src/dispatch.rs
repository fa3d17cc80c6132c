//! Encoding relay messages for the webhook transport.

use crate::event::LoopMarker;
use crate::webhook::{OutgoingMessage, WebhookSender};
use crate::Result;
use chatrelay_core::config::{GeneralConfig, MattermostConfig};
use chatrelay_core::{Message, EXTRA_FILE_FAILURE_SIZE};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Username used for adapter-generated notices.
pub const SYSTEM_USERNAME: &str = "<system> ";

const TEMPLATE_PLACEHOLDERS: [&str; 3] = ["{NICK}", "{BRIDGE}", "{PROTOCOL}"];

/// Whether an icon URL is a per-message template.
pub fn is_icon_template(icon_url: &str) -> bool {
    TEMPLATE_PLACEHOLDERS.iter().any(|p| icon_url.contains(p))
}

/// Expand `{NICK}`, `{BRIDGE}` and `{PROTOCOL}` for a message.
pub fn expand_icon_template(template: &str, msg: &Message) -> String {
    let (protocol, bridge) = msg.account_parts();
    template
        .replace("{NICK}", &msg.username)
        .replace("{BRIDGE}", bridge)
        .replace("{PROTOCOL}", protocol)
}

/// Sends relay messages through the webhook.
pub struct WebhookDispatcher {
    sender: Arc<dyn WebhookSender>,
    marker: LoopMarker,
    prefix_messages_with_nick: bool,
    icon_url: Option<String>,
    media_download_size: u64,
}

impl fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("marker", &self.marker)
            .field("prefix_messages_with_nick", &self.prefix_messages_with_nick)
            .field("icon_url", &self.icon_url)
            .finish_non_exhaustive()
    }
}

impl WebhookDispatcher {
    /// Create a dispatcher.
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        marker: LoopMarker,
        config: &MattermostConfig,
        general: &GeneralConfig,
    ) -> Self {
        Self {
            sender,
            marker,
            prefix_messages_with_nick: config.prefix_messages_with_nick,
            icon_url: config.icon_url().map(str::to_string),
            media_download_size: general.media_download_size,
        }
    }

    /// Icon to show for a message.
    ///
    /// A configured template wins, then the message's own avatar, then the
    /// configured plain icon URL.
    pub fn resolve_icon(&self, msg: &Message) -> String {
        match self.icon_url.as_deref() {
            Some(icon) if is_icon_template(icon) => expand_icon_template(icon, msg),
            _ if !msg.avatar.is_empty() => msg.avatar.clone(),
            Some(icon) => icon.to_string(),
            None => String::new(),
        }
    }

    /// Notices for files rejected by the download size limit.
    fn failure_notices(&self, msg: &Message) -> Vec<Message> {
        msg.extra
            .get(EXTRA_FILE_FAILURE_SIZE)
            .into_iter()
            .flatten()
            .map(|file| {
                let text = format!(
                    "file {} too big to download ({} > allowed size: {})",
                    file.name, file.size, self.media_download_size
                );
                Message::new(SYSTEM_USERNAME, text, msg.channel.clone())
                    .with_account(msg.account.clone())
            })
            .collect()
    }

    fn encode(&self, msg: &Message, icon_url: String) -> OutgoingMessage {
        OutgoingMessage {
            channel: msg.channel.clone(),
            icon_url,
            username: msg.username.clone(),
            text: msg.text.clone(),
            props: self.marker.props(),
        }
    }

    /// Send a message. Non-plain events are skipped.
    pub async fn dispatch(&self, msg: &Message) -> Result<()> {
        if !msg.event.is_plain() {
            debug!("Skipping {} event for webhook", msg.event.as_str());
            return Ok(());
        }

        let mut msg = msg.clone();
        if self.prefix_messages_with_nick {
            msg.text = format!("{}{}", msg.username, msg.text);
        }

        if msg.has_extra() {
            for notice in self.failure_notices(&msg) {
                let icon = self.icon_url.as_deref().map(|i| expand_icon_template(i, &notice));
                let payload = self.encode(&notice, icon.unwrap_or_default());
                if let Err(e) = self.sender.send(&payload).await {
                    error!("sendWebhook failed: {}", e);
                }
            }

            // the webhook cannot upload files, link them instead
            for file in msg.files().to_vec() {
                if !file.url.is_empty() {
                    msg.text.push_str(&file.url);
                }
            }
        }

        let icon = self.resolve_icon(&msg);
        let payload = self.encode(&msg, icon);
        if let Err(e) = self.sender.send(&payload).await {
            error!("sendWebhook failed: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
