//! Configuration schema definitions.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Main chatrelay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Settings shared by every adapter.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Mattermost adapter settings.
    #[serde(default)]
    pub mattermost: MattermostConfig,
}

/// Settings shared by every adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Public base URL of the media server, used to build avatar URLs.
    #[serde(default, alias = "MediaServerDownload", skip_serializing_if = "Option::is_none")]
    pub media_server_download: Option<String>,

    /// Upload endpoint of the media server.
    #[serde(default, alias = "MediaServerUpload", skip_serializing_if = "Option::is_none")]
    pub media_server_upload: Option<String>,

    /// Largest file, in bytes, that adapters download.
    #[serde(default = "default_media_download_size", alias = "MediaDownloadSize")]
    pub media_download_size: u64,
}

fn default_media_download_size() -> u64 {
    1_000_000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            media_server_download: None,
            media_server_upload: None,
            media_download_size: default_media_download_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Which client schema revision the Mattermost adapter speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRevision {
    /// Probe the server version at connect time.
    #[default]
    Auto,
    /// Servers before 6.0.
    Legacy,
    /// Servers 6.0 and later.
    Modern,
}

/// Mattermost adapter configuration.
///
/// Field aliases accept the key names used by matterbridge-style TOML
/// configs converted to JSON5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MattermostConfig {
    /// Bridge name; the account becomes `mattermost.<name>`.
    #[serde(default = "default_name")]
    pub name: String,

    /// Server host, optionally with port (no scheme).
    #[serde(default, alias = "Server")]
    pub server: String,

    /// Team the adapter is scoped to.
    #[serde(default, alias = "Team")]
    pub team: String,

    /// Login name for password authentication.
    #[serde(default, alias = "Login")]
    pub login: String,

    /// Password for `login`.
    #[serde(default, alias = "Password")]
    pub password: SecretString,

    /// Personal access token, preferred over `login`/`password`.
    #[serde(default, alias = "Token")]
    pub token: SecretString,

    /// Incoming webhook URL used for sending.
    #[serde(default, alias = "WebhookURL", skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Address the outgoing-webhook listener binds to.
    #[serde(default, alias = "WebhookBindAddress", skip_serializing_if = "Option::is_none")]
    pub webhook_bind_address: Option<String>,

    /// Accept invalid TLS certificates.
    #[serde(default, alias = "SkipTLSVerify")]
    pub skip_tls_verify: bool,

    /// Do not check the server version during login.
    #[serde(default, alias = "SkipVersionCheck")]
    pub skip_version_check: bool,

    /// Talk plain HTTP to the server.
    #[serde(default, alias = "NoTLS")]
    pub no_tls: bool,

    /// Prepend the sender name to outbound text.
    #[serde(default, alias = "PrefixMessagesWithNick")]
    pub prefix_messages_with_nick: bool,

    /// Do not forward join/leave notifications.
    #[serde(default, alias = "nosendjoinpart", alias = "NoSendJoinPart")]
    pub no_send_join_part: bool,

    /// Drop edit notifications.
    #[serde(default, alias = "EditDisable")]
    pub edit_disable: bool,

    /// Appended to the text of forwarded edits.
    #[serde(default, alias = "EditSuffix")]
    pub edit_suffix: String,

    /// Fallback icon; may contain `{NICK}`, `{BRIDGE}` and `{PROTOCOL}`.
    #[serde(default, alias = "iconurl", alias = "IconURL", skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,

    /// Client schema revision.
    #[serde(default)]
    pub api_revision: ApiRevision,

    /// Verbose session client logging.
    #[serde(default)]
    pub debug: bool,
}

fn default_name() -> String {
    "mattermost".to_string()
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            server: String::new(),
            team: String::new(),
            login: String::new(),
            password: SecretString::default(),
            token: SecretString::default(),
            webhook_url: None,
            webhook_bind_address: None,
            skip_tls_verify: false,
            skip_version_check: false,
            no_tls: false,
            prefix_messages_with_nick: false,
            no_send_join_part: false,
            edit_disable: false,
            edit_suffix: String::new(),
            icon_url: None,
            api_revision: ApiRevision::Auto,
            debug: false,
        }
    }
}

impl MattermostConfig {
    /// Account identifier stamped on forwarded messages.
    pub fn account(&self) -> String {
        format!("mattermost.{}", self.name)
    }

    /// Configured webhook URL, ignoring empty strings.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref().filter(|s| !s.is_empty())
    }

    /// Configured webhook bind address, ignoring empty strings.
    pub fn webhook_bind_address(&self) -> Option<&str> {
        self.webhook_bind_address.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether either webhook transport is configured.
    pub fn is_webhook_client(&self) -> bool {
        self.webhook_url().is_some() || self.webhook_bind_address().is_some()
    }

    /// Whether any session credential is configured.
    pub fn has_session_credentials(&self) -> bool {
        !self.token.is_empty() || !self.login.is_empty()
    }

    /// Fallback icon URL, ignoring empty strings.
    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref().filter(|s| !s.is_empty())
    }
}
