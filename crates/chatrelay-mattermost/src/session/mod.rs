//! Authenticated session, over either client schema revision.
//!
//! The session client itself (socket framing, reconnects, heartbeat
//! internals) lives outside this crate and is reached through the
//! [`legacy::LegacyClient`] and [`modern::ModernClient`] traits. This module
//! wraps each of them in a [`SessionAdapter`] so the rest of the adapter sees
//! one interface. The revision is picked once, in [`new_session`].

pub mod legacy;
pub mod modern;

use crate::event::NativeEvent;
use crate::Result;
use async_trait::async_trait;
use chatrelay_core::config::{ApiRevision, MattermostConfig};
use chatrelay_core::SecretString;
use serde_json::{Map, Value};
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Queue the receive loop pushes native events onto.
pub type EventSender = mpsc::Sender<Box<dyn NativeEvent>>;

/// Client schema revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRevision {
    /// Servers before 6.0.
    Legacy,
    /// Servers 6.0 and later.
    Modern,
}

impl SchemaRevision {
    /// Revision forced by configuration, `None` when it should be probed.
    pub fn from_config(revision: ApiRevision) -> Option<Self> {
        match revision {
            ApiRevision::Auto => None,
            ApiRevision::Legacy => Some(Self::Legacy),
            ApiRevision::Modern => Some(Self::Modern),
        }
    }

    /// Whether this is the modern revision.
    pub fn is_modern(&self) -> bool {
        matches!(self, Self::Modern)
    }
}

impl fmt::Display for SchemaRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Modern => f.write_str("modern"),
        }
    }
}

/// How the session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAuth {
    /// Personal access token, sent as the password `token=<token>`.
    Token,
    /// Login name and password.
    Password,
}

/// Everything a session client needs to log in.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    /// Login name.
    pub login: String,
    /// Password, or `token=<token>` for token auth.
    pub password: SecretString,
    /// Team name.
    pub team: String,
    /// Server host.
    pub server: String,
    /// Accept invalid certificates.
    pub skip_tls_verify: bool,
    /// Skip the server version check.
    pub skip_version_check: bool,
    /// Use plain HTTP.
    pub no_tls: bool,
    /// Verbose client logging.
    pub debug: bool,
}

impl SessionCredentials {
    /// Build credentials for the given auth method.
    pub fn from_config(config: &MattermostConfig, auth: SessionAuth) -> Self {
        let password = match auth {
            SessionAuth::Token => config.token.prefixed("token="),
            SessionAuth::Password => config.password.clone(),
        };

        Self {
            login: config.login.clone(),
            password,
            team: config.team.clone(),
            server: config.server.clone(),
            skip_tls_verify: config.skip_tls_verify,
            skip_version_check: config.skip_version_check,
            no_tls: config.no_tls,
            debug: config.debug,
        }
    }
}

/// Builds session clients for either revision.
///
/// Implemented by whatever crate provides the actual Mattermost client.
pub trait SessionConnector: Send + Sync {
    /// Client speaking the legacy schema.
    fn legacy(&self, credentials: &SessionCredentials) -> Arc<dyn legacy::LegacyClient>;

    /// Client speaking the modern schema.
    fn modern(&self, credentials: &SessionCredentials) -> Arc<dyn modern::ModernClient>;
}

/// Uniform session operations, identical across revisions.
#[async_trait]
pub trait SessionAdapter: Send + Sync + Debug {
    /// Revision this adapter wraps.
    fn revision(&self) -> SchemaRevision;

    /// Authenticate against the server.
    async fn login(&self) -> Result<()>;

    /// Id of the team the session logged into.
    fn team_id(&self) -> String;

    /// Username of the authenticated account, empty before login.
    fn bot_username(&self) -> String;

    /// Resolve a channel name within a team.
    ///
    /// Returns `ChannelNotFound` when the lookup yields an empty id.
    async fn channel_id(&self, name: &str, team_id: &str) -> Result<String>;

    /// Replace a channel's header.
    async fn update_channel_header(&self, channel_id: &str, header: &str) -> Result<()>;

    /// Post a message, returning the new post id.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        root_id: &str,
        props: Map<String, Value>,
    ) -> Result<String>;

    /// Start the status loop and, when `events` is given, event receipt.
    ///
    /// Both stop when `cancel` fires; receipt also stops once the client
    /// has no more events or `events` is closed. A send-only session passes
    /// `None` and never reads the websocket.
    fn spawn_loops(
        &self,
        events: Option<EventSender>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>>;
}

/// Create the session adapter for a revision.
pub fn new_session(
    revision: SchemaRevision,
    connector: &dyn SessionConnector,
    credentials: &SessionCredentials,
) -> Arc<dyn SessionAdapter> {
    match revision {
        SchemaRevision::Legacy => Arc::new(legacy::LegacySession::new(connector.legacy(credentials))),
        SchemaRevision::Modern => Arc::new(modern::ModernSession::new(connector.modern(credentials))),
    }
}
