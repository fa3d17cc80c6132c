//! The protocol-agnostic message carried by the relay bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra key holding uploaded or downloadable files.
pub const EXTRA_FILE: &str = "file";

/// Extra key holding files that were rejected for exceeding the download limit.
pub const EXTRA_FILE_FAILURE_SIZE: &str = "file_failure_size";

/// A message flowing between adapters through the relay bus.
///
/// Adapters build one of these from a platform event and push it onto the
/// bus; once sent it is never mutated. In the other direction an adapter
/// receives a clone and re-encodes it for its own platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the sender.
    #[serde(default)]
    pub username: String,

    /// Text content.
    #[serde(default)]
    pub text: String,

    /// Channel name on the originating platform.
    #[serde(default)]
    pub channel: String,

    /// Platform-specific sender id.
    #[serde(default)]
    pub user_id: String,

    /// Account that produced the message, formatted `protocol.name`.
    #[serde(default)]
    pub account: String,

    /// Structural event carried by the message; `Plain` for chat text.
    #[serde(default, skip_serializing_if = "Event::is_plain")]
    pub event: Event,

    /// Named attachment lists (see [`EXTRA_FILE`]).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Vec<FileInfo>>,

    /// Avatar URL of the sender, empty when unknown.
    #[serde(default)]
    pub avatar: String,

    /// Platform message id.
    #[serde(default)]
    pub id: String,

    /// Id of the thread root this message replies to.
    #[serde(default)]
    pub parent_id: String,

    /// Protocol of the originating adapter.
    #[serde(default)]
    pub protocol: String,

    /// Gateway the message is routed through.
    #[serde(default)]
    pub gateway: String,

    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a plain text message.
    pub fn new(
        username: impl Into<String>,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
            channel: channel.into(),
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    /// Set the event.
    pub fn with_event(mut self, event: Event) -> Self {
        self.event = event;
        self
    }

    /// Set the account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    /// Append a file entry under the given extra key.
    pub fn with_extra(mut self, key: impl Into<String>, file: FileInfo) -> Self {
        self.extra.entry(key.into()).or_default().push(file);
        self
    }

    /// Files attached under [`EXTRA_FILE`].
    pub fn files(&self) -> &[FileInfo] {
        self.extra.get(EXTRA_FILE).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the message carries any extra payload at all.
    pub fn has_extra(&self) -> bool {
        !self.extra.is_empty()
    }

    /// Split `account` into its protocol and bridge name.
    pub fn account_parts(&self) -> (&str, &str) {
        self.account.split_once('.').unwrap_or((self.account.as_str(), ""))
    }
}

/// Structural event tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Ordinary chat text.
    #[default]
    #[serde(rename = "")]
    Plain,
    /// A user joined or left a channel.
    JoinLeave,
    /// The channel topic or header changed.
    TopicChange,
    /// A message was deleted.
    MsgDelete,
    /// A `/me` style action.
    UserAction,
    /// An avatar was fetched and uploaded to the media server.
    AvatarDownload,
    /// A file exceeded the configured download size.
    FileFailureSize,
}

impl Event {
    /// Whether this is ordinary chat text.
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain)
    }

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::JoinLeave => "join_leave",
            Self::TopicChange => "topic_change",
            Self::MsgDelete => "msg_delete",
            Self::UserAction => "user_action",
            Self::AvatarDownload => "avatar_download",
            Self::FileFailureSize => "file_failure_size",
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name.
    pub name: String,

    /// Public URL once uploaded to a media server.
    #[serde(default)]
    pub url: String,

    /// Content hash, set after a successful upload.
    #[serde(default)]
    pub sha: String,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,

    /// Caption.
    #[serde(default)]
    pub comment: String,

    /// Whether this file is a user avatar.
    #[serde(default)]
    pub avatar: bool,

    /// Id of the file on the originating platform.
    #[serde(default)]
    pub native_id: String,

    /// Raw content, when downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl FileInfo {
    /// Create a file entry with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the content hash.
    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = sha.into();
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}
