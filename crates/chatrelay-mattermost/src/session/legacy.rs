//! Legacy client schema (servers before 6.0).

use super::{EventSender, SchemaRevision, SessionAdapter};
use crate::error::BridgeError;
use crate::event::{NativeEvent, PostView, DATA_TEAM_ID};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Raw websocket event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSocketEvent {
    /// Event kind.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: HashMap<String, Value>,
    /// Sequence number.
    #[serde(default)]
    pub seq: i64,
}

/// A post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub post_type: String,
    #[serde(default)]
    pub props: Option<Map<String, Value>>,
    #[serde(default)]
    pub has_reactions: bool,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// An account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
}

/// Event as delivered by the legacy client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub raw: WebSocketEvent,
    #[serde(default)]
    pub post: Option<Post>,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub msg_type: String,
}

impl NativeEvent for Message {
    fn post_type(&self) -> &str {
        &self.msg_type
    }

    fn event_kind(&self) -> &str {
        &self.raw.event
    }

    fn post(&self) -> Option<PostView<'_>> {
        self.post.as_ref().map(|p| PostView {
            id: &p.id,
            root_id: &p.root_id,
            props: p.props.as_ref(),
            has_reactions: p.has_reactions,
            file_ids: &p.file_ids,
        })
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn team_id(&self) -> Option<&str> {
        self.raw.data.get(DATA_TEAM_ID).and_then(Value::as_str)
    }
}

/// Legacy session client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LegacyClient: Send + Sync {
    /// Log in and open the websocket.
    async fn login(&self) -> anyhow::Result<()>;

    /// Id of the configured team, valid after login.
    fn get_team_id(&self) -> String;

    /// Authenticated account, valid after login.
    fn user(&self) -> Option<User>;

    /// Channel id by name, empty when unknown.
    async fn get_channel_id(&self, name: &str, team_id: &str) -> String;

    /// Replace a channel header.
    async fn update_channel_header(&self, channel_id: &str, header: &str) -> anyhow::Result<()>;

    /// Create a post, returning its id.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        root_id: &str,
        props: Map<String, Value>,
    ) -> anyhow::Result<String>;

    /// Next websocket event; `None` once the socket is gone for good.
    async fn next_message(&self) -> Option<Message>;

    /// Keep the account's status fresh. Runs until the client shuts down.
    async fn status_loop(&self);
}

/// [`SessionAdapter`] over a [`LegacyClient`].
pub struct LegacySession {
    client: Arc<dyn LegacyClient>,
}

impl fmt::Debug for LegacySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacySession").finish_non_exhaustive()
    }
}

impl LegacySession {
    /// Wrap a client.
    pub fn new(client: Arc<dyn LegacyClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionAdapter for LegacySession {
    fn revision(&self) -> SchemaRevision {
        SchemaRevision::Legacy
    }

    async fn login(&self) -> Result<()> {
        self.client
            .login()
            .await
            .map_err(|e| BridgeError::connection(e.to_string()))
    }

    fn team_id(&self) -> String {
        self.client.get_team_id()
    }

    fn bot_username(&self) -> String {
        self.client.user().map(|u| u.username).unwrap_or_default()
    }

    async fn channel_id(&self, name: &str, team_id: &str) -> Result<String> {
        let id = self.client.get_channel_id(name, team_id).await;
        if id.is_empty() {
            return Err(BridgeError::channel_not_found(name));
        }
        Ok(id)
    }

    async fn update_channel_header(&self, channel_id: &str, header: &str) -> Result<()> {
        self.client
            .update_channel_header(channel_id, header)
            .await
            .map_err(|e| BridgeError::send(e.to_string()))
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        root_id: &str,
        props: Map<String, Value>,
    ) -> Result<String> {
        self.client
            .post_message(channel_id, text, root_id, props)
            .await
            .map_err(|e| BridgeError::send(e.to_string()))
    }

    fn spawn_loops(
        &self,
        events: Option<EventSender>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        if let Some(events) = events {
            let client = self.client.clone();
            let stop = cancel.clone();
            handles.push(tokio::spawn(async move {
                info!("Starting legacy websocket receiver");
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => {
                            debug!("Legacy websocket receiver shutting down");
                            break;
                        }
                        message = client.next_message() => {
                            let Some(message) = message else {
                                warn!("Legacy websocket closed");
                                break;
                            };
                            if events.send(Box::new(message)).await.is_err() {
                                debug!("Event queue closed, stopping receiver");
                                break;
                            }
                        }
                    }
                }
            }));
        }

        let client = self.client.clone();
        handles.push(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("Legacy status loop shutting down"),
                _ = client.status_loop() => debug!("Legacy status loop exited"),
            }
        }));

        handles
    }
}
