//! Shared fakes for the integration tests.
//!
//! [`FakeLegacyClient`] stands in for the external session client: tests
//! push native events into it and inspect what the adapter posted.

use async_trait::async_trait;
use chatrelay_mattermost::session::legacy::{self, LegacyClient};
use chatrelay_mattermost::session::modern::ModernClient;
use chatrelay_mattermost::session::{SessionConnector, SessionCredentials};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Team the fake session logs into.
pub const TEAM_ID: &str = "team-1";

/// Username of the fake session account.
pub const BOT_USERNAME: &str = "relaybot";

/// A post the adapter created.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPost {
    pub channel_id: String,
    pub text: String,
    pub root_id: String,
    pub props: Map<String, Value>,
}

/// In-memory legacy session client.
pub struct FakeLegacyClient {
    events: tokio::sync::Mutex<mpsc::Receiver<legacy::Message>>,
    channels: HashMap<String, String>,
    pub posts: Mutex<Vec<SentPost>>,
    pub headers: Mutex<Vec<(String, String)>>,
    pub credentials: Mutex<Option<SessionCredentials>>,
}

impl FakeLegacyClient {
    /// Create a client knowing the given `(name, id)` channels, plus the
    /// sender feeding its websocket.
    pub fn new(channels: &[(&str, &str)]) -> (Arc<Self>, mpsc::Sender<legacy::Message>) {
        let (tx, rx) = mpsc::channel(16);
        let client = Self {
            events: tokio::sync::Mutex::new(rx),
            channels: channels
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
            posts: Mutex::new(Vec::new()),
            headers: Mutex::new(Vec::new()),
            credentials: Mutex::new(None),
        };
        (Arc::new(client), tx)
    }
}

#[async_trait]
impl LegacyClient for FakeLegacyClient {
    async fn login(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn get_team_id(&self) -> String {
        TEAM_ID.to_string()
    }

    fn user(&self) -> Option<legacy::User> {
        Some(legacy::User {
            id: "bot-id".to_string(),
            username: BOT_USERNAME.to_string(),
            nickname: String::new(),
        })
    }

    async fn get_channel_id(&self, name: &str, _team_id: &str) -> String {
        self.channels.get(name).cloned().unwrap_or_default()
    }

    async fn update_channel_header(&self, channel_id: &str, header: &str) -> anyhow::Result<()> {
        self.headers
            .lock()
            .push((channel_id.to_string(), header.to_string()));
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        root_id: &str,
        props: Map<String, Value>,
    ) -> anyhow::Result<String> {
        let mut posts = self.posts.lock();
        posts.push(SentPost {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            root_id: root_id.to_string(),
            props,
        });
        Ok(format!("post-{}", posts.len()))
    }

    async fn next_message(&self) -> Option<legacy::Message> {
        self.events.lock().await.recv().await
    }

    async fn status_loop(&self) {
        std::future::pending::<()>().await
    }
}

/// Connector handing out one [`FakeLegacyClient`].
pub struct FakeConnector {
    pub client: Arc<FakeLegacyClient>,
}

impl SessionConnector for FakeConnector {
    fn legacy(&self, credentials: &SessionCredentials) -> Arc<dyn LegacyClient> {
        *self.client.credentials.lock() = Some(credentials.clone());
        self.client.clone()
    }

    fn modern(&self, _credentials: &SessionCredentials) -> Arc<dyn ModernClient> {
        panic!("FakeConnector only serves the legacy schema")
    }
}

/// A legacy `posted` event in [`TEAM_ID`].
pub fn posted(channel: &str, username: &str, text: &str, props: Value) -> legacy::Message {
    serde_json::from_value(json!({
        "raw": { "event": "posted", "data": { "team_id": TEAM_ID } },
        "post": { "id": format!("in-{}", text.len()), "props": props },
        "channel": channel,
        "username": username,
        "user_id": format!("id-{}", username),
        "text": text,
    }))
    .expect("valid legacy event")
}
