//! Mattermost adapter for chatrelay.
//!
//! Translates between Mattermost and the relay bus [`chatrelay_core::Message`].
//! The adapter can talk to Mattermost in three ways, alone or combined:
//!
//! - an incoming-webhook URL for sending,
//! - an HTTP listener for outgoing-webhook posts,
//! - an authenticated session (legacy or modern client schema) for both.
//!
//! [`connect::resolve`] picks the combination from configuration and
//! [`BridgeBuilder`] brings it up.

pub mod error;
pub mod event;
pub mod session;
pub mod connect;
pub mod filter;
pub mod translate;
pub mod dispatch;
pub mod webhook;
pub mod topic;
pub mod avatar;
pub mod version;
pub mod bridge;

pub use error::BridgeError;
pub use event::{LoopMarker, NativeEvent};
pub use session::{SchemaRevision, SessionAdapter, SessionAuth, SessionConnector, SessionCredentials};
pub use connect::{ConnectionMode, ConnectionPlan};
pub use filter::{DropReason, InboundFilter, Verdict};
pub use dispatch::WebhookDispatcher;
pub use webhook::{IncomingMessage, OutgoingMessage, WebhookClient, WebhookSender};
pub use topic::{extract_topic, TopicChange};
pub use avatar::AvatarCache;
pub use bridge::{BridgeBuilder, MattermostBridge};

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
