//! Revision-independent view of events delivered by the session client.
//!
//! The legacy and modern client schemas name their fields differently but
//! carry the same information. Both implement [`NativeEvent`], and everything
//! downstream (the inbound filter, translation) is written against this trait
//! only, so the two revisions cannot drift apart.

use chatrelay_core::InstanceId;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Websocket event kind for a new post.
pub const EVENT_POSTED: &str = "posted";

/// Websocket event kind for an edited post.
pub const EVENT_POST_EDITED: &str = "post_edited";

/// Websocket event kind for a deleted post.
pub const EVENT_POST_DELETED: &str = "post_deleted";

/// Post type of the combined join/leave system message.
pub const POST_TYPE_JOIN_LEAVE: &str = "system_join_leave";

/// Post type emitted when a user joins a channel.
pub const POST_TYPE_JOIN_CHANNEL: &str = "system_join_channel";

/// Post type emitted when a user leaves a channel.
pub const POST_TYPE_LEAVE_CHANNEL: &str = "system_leave_channel";

/// Post type emitted when the channel header changes.
pub const POST_TYPE_HEADER_CHANGE: &str = "system_header_change";

/// Key of the team id in the event data.
pub const DATA_TEAM_ID: &str = "team_id";

/// Whether a post type is one of the join/leave notifications.
pub fn is_join_leave(post_type: &str) -> bool {
    matches!(
        post_type,
        POST_TYPE_JOIN_LEAVE | POST_TYPE_JOIN_CHANNEL | POST_TYPE_LEAVE_CHANNEL
    )
}

/// Borrowed view of the post attached to an event.
#[derive(Debug, Clone, Copy)]
pub struct PostView<'a> {
    /// Post id.
    pub id: &'a str,
    /// Thread root id, empty for top-level posts.
    pub root_id: &'a str,
    /// Post properties.
    pub props: Option<&'a Map<String, Value>>,
    /// Whether reactions are attached.
    pub has_reactions: bool,
    /// Ids of attached files.
    pub file_ids: &'a [String],
}

/// An event delivered by the session client, whatever its schema revision.
pub trait NativeEvent: Send + Sync + Debug {
    /// Post type, e.g. `system_join_leave`; empty for ordinary posts.
    fn post_type(&self) -> &str;

    /// Websocket event kind, e.g. `posted`.
    fn event_kind(&self) -> &str;

    /// The attached post, if this is a post event.
    fn post(&self) -> Option<PostView<'_>>;

    /// Channel name.
    fn channel(&self) -> &str;

    /// Author username.
    fn username(&self) -> &str;

    /// Author user id.
    fn user_id(&self) -> &str;

    /// Text of the post or notification.
    fn text(&self) -> &str;

    /// Team id embedded in the event data, if it is a string.
    fn team_id(&self) -> Option<&str>;
}

/// The property stamped on every post this adapter instance sends.
///
/// Keyed by instance id, so two adapters sharing a server do not suppress
/// each other's messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopMarker {
    key: String,
}

impl LoopMarker {
    /// Marker for an adapter instance.
    pub fn new(instance_id: &InstanceId) -> Self {
        Self {
            key: format!("matterbridge_{}", instance_id),
        }
    }

    /// Property key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Set the marker on a property map.
    pub fn stamp(&self, props: &mut Map<String, Value>) {
        props.insert(self.key.clone(), Value::Bool(true));
    }

    /// Fresh property map carrying only the marker.
    pub fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        self.stamp(&mut props);
        props
    }

    /// Whether the properties carry this marker as a boolean.
    pub fn is_present(&self, props: Option<&Map<String, Value>>) -> bool {
        matches!(props.and_then(|p| p.get(&self.key)), Some(Value::Bool(_)))
    }
}
