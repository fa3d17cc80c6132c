//! Incoming and outgoing Mattermost webhooks.
//!
//! Outgoing: JSON posts to the configured incoming-webhook URL. Incoming: an
//! HTTP listener that accepts Mattermost's form-encoded outgoing-webhook
//! requests and queues them for translation.

use crate::error::BridgeError;
use crate::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Payload posted to an incoming-webhook URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
}

/// Form body of a Mattermost outgoing-webhook request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomingMessage {
    pub token: String,
    pub team_id: String,
    pub team_domain: String,
    pub channel_id: String,
    pub channel_name: String,
    pub timestamp: i64,
    pub user_id: String,
    pub user_name: String,
    pub post_id: String,
    pub text: String,
    pub trigger_word: String,
    pub file_ids: String,
}

/// Fire-and-forget webhook transport.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Deliver one payload.
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

/// [`WebhookSender`] posting JSON over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    /// Create a client for a webhook URL.
    pub fn new(url: impl Into<String>, skip_tls_verify: bool) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(skip_tls_verify)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookSender for WebhookClient {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        self.client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| BridgeError::send(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::send(e.to_string()))?;

        Ok(())
    }
}

/// Router accepting outgoing-webhook posts on `/`.
pub fn router(queue: mpsc::Sender<IncomingMessage>) -> Router {
    Router::new()
        .route("/", post(incoming_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(queue)
}

async fn incoming_handler(
    State(queue): State<mpsc::Sender<IncomingMessage>>,
    Form(message): Form<IncomingMessage>,
) -> StatusCode {
    debug!(
        "Webhook post from {} in {}",
        message.user_name, message.channel_name
    );
    match queue.send(message).await {
        Ok(()) => StatusCode::OK,
        Err(_) => {
            warn!("Webhook queue closed, rejecting post");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Bound outgoing-webhook listener.
#[derive(Debug)]
pub struct WebhookListener {
    listener: TcpListener,
}

impl WebhookListener {
    /// Bind to an address such as `0.0.0.0:9999`.
    pub async fn bind(addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| BridgeError::Config(format!("invalid webhook bind address {}: {}", addr, e)))?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `cancel` fires.
    pub async fn run(
        self,
        queue: mpsc::Sender<IncomingMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let addr = self.local_addr()?;
        info!("Listening for webhook posts on {}", addr);

        axum::serve(self.listener, router(queue))
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                debug!("Webhook listener shutting down");
            })
            .await?;

        Ok(())
    }
}
