//! Avatar hashes of users whose avatar is already on the media server.

use chatrelay_core::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// User id to avatar content hash. Entries live for the whole process.
#[derive(Debug, Default)]
pub struct AvatarCache {
    entries: RwLock<HashMap<String, String>>,
}

impl AvatarCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a user's avatar hash. Empty hashes are ignored.
    pub fn record(&self, user_id: &str, sha: &str) {
        if sha.is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        if entries.get(user_id).map(String::as_str) == Some(sha) {
            return;
        }
        debug!("Added {} to {} in avatar cache", sha, user_id);
        entries.insert(user_id.to_string(), sha.to_string());
    }

    /// Record the avatar carried by an `AvatarDownload` message.
    ///
    /// Returns whether the message carried a file entry.
    pub fn record_from_message(&self, msg: &Message) -> bool {
        let Some(file) = msg.files().first() else {
            warn!("Avatar message for {} carries no file", msg.user_id);
            return false;
        };
        self.record(&msg.user_id, &file.sha);
        true
    }

    /// Hash recorded for a user.
    pub fn get(&self, user_id: &str) -> Option<String> {
        self.entries.read().get(user_id).cloned()
    }

    /// Public avatar URL for a user, if their avatar has been uploaded.
    pub fn avatar_url(&self, user_id: &str, media_server: &str) -> Option<String> {
        self.get(user_id).map(|sha| {
            format!("{}/{}/{}.png", media_server.trim_end_matches('/'), sha, user_id)
        })
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
