//! Modern client schema (servers 6.0 and later).
//!
//! Field access goes through accessor methods here, and the client exposes a
//! pull-style event queue plus a single-shot status ping instead of the
//! legacy long-running loops.

use super::{EventSender, SchemaRevision, SessionAdapter};
use crate::error::BridgeError;
use crate::event::{NativeEvent, PostView, DATA_TEAM_ID};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the status ping runs.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Raw websocket event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSocketEvent {
    event: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl WebSocketEvent {
    /// Create an event.
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event_type.into(),
            data,
        }
    }

    /// Event kind.
    pub fn event_type(&self) -> &str {
        &self.event
    }

    /// Event payload.
    pub fn get_data(&self) -> &Map<String, Value> {
        &self.data
    }
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
    props: Map<String, Value>,
    #[serde(default)]
    pub has_reactions: bool,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl Post {
    /// Post properties.
    pub fn get_props(&self) -> &Map<String, Value> {
        &self.props
    }

    /// Replace the properties.
    pub fn set_props(&mut self, props: Map<String, Value>) {
        self.props = props;
    }
}

/// An account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
}

/// Event as delivered by the modern client.
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
        self.raw.event_type()
    }

    fn post(&self) -> Option<PostView<'_>> {
        self.post.as_ref().map(|p| PostView {
            id: &p.id,
            root_id: &p.root_id,
            props: Some(p.get_props()),
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
        self.raw.get_data().get(DATA_TEAM_ID).and_then(Value::as_str)
    }
}

/// Modern session client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModernClient: Send + Sync {
    /// Log in and open the websocket.
    async fn login(&self) -> anyhow::Result<()>;

    /// Id of the configured team, valid after login.
    fn team_id(&self) -> String;

    /// Authenticated account, valid after login.
    fn me(&self) -> Option<User>;

    /// Channel id by name, empty when unknown.
    async fn get_channel_id(&self, name: &str, team_id: &str) -> String;

    /// Replace a channel header.
    async fn update_channel_header(&self, channel_id: &str, header: &str) -> anyhow::Result<()>;

    /// Create a post.
    async fn create_post(&self, post: Post) -> anyhow::Result<Post>;

    /// Next queued websocket event; `None` once the socket is gone for good.
    async fn recv(&self) -> Option<Message>;

    /// Refresh the account's status once.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// [`SessionAdapter`] over a [`ModernClient`].
pub struct ModernSession {
    client: Arc<dyn ModernClient>,
}

impl fmt::Debug for ModernSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModernSession").finish_non_exhaustive()
    }
}

impl ModernSession {
    /// Wrap a client.
    pub fn new(client: Arc<dyn ModernClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionAdapter for ModernSession {
    fn revision(&self) -> SchemaRevision {
        SchemaRevision::Modern
    }

    async fn login(&self) -> Result<()> {
        self.client
            .login()
            .await
            .map_err(|e| BridgeError::connection(e.to_string()))
    }

    fn team_id(&self) -> String {
        self.client.team_id()
    }

    fn bot_username(&self) -> String {
        self.client.me().map(|u| u.username).unwrap_or_default()
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
        let mut post = Post {
            channel_id: channel_id.to_string(),
            message: text.to_string(),
            root_id: root_id.to_string(),
            ..Default::default()
        };
        post.set_props(props);

        let created = self
            .client
            .create_post(post)
            .await
            .map_err(|e| BridgeError::send(e.to_string()))?;
        Ok(created.id)
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
                info!("Starting modern websocket receiver");
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => {
                            debug!("Modern websocket receiver shutting down");
                            break;
                        }
                        message = client.recv() => {
                            let Some(message) = message else {
                                warn!("Modern websocket closed");
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
            let mut ticker = tokio::time::interval(STATUS_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Modern status loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = client.ping().await {
                            warn!("Status ping failed: {}", e);
                        }
                    }
                }
            }
        }));

        handles
    }
}
