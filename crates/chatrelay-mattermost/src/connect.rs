//! Connection strategy resolution.

use crate::error::BridgeError;
use crate::session::SessionAuth;
use crate::Result;
use chatrelay_core::config::MattermostConfig;
use std::fmt;
use tracing::info;

/// Primary transport mode, picked once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Receive through the webhook listener.
    WebhookBind,
    /// Send through the webhook URL.
    WebhookUrl,
    /// Session authenticated with a personal access token.
    SessionToken,
    /// Session authenticated with login and password.
    SessionLogin,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WebhookBind => "webhook-bind",
            Self::WebhookUrl => "webhook-url",
            Self::SessionToken => "session-token",
            Self::SessionLogin => "session-login",
        };
        f.write_str(name)
    }
}

/// Which transports to bring up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPlan {
    /// Resolved mode.
    pub mode: ConnectionMode,
    /// Send through this webhook URL.
    pub webhook_url: Option<String>,
    /// Listen for outgoing-webhook posts on this address.
    pub webhook_bind: Option<String>,
    /// Open an authenticated session.
    pub session: Option<SessionAuth>,
}

impl ConnectionPlan {
    /// Whether a session will be opened.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Whether outbound messages go through the webhook.
    pub fn sends_via_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Whether inbound events are read from the session websocket.
    ///
    /// With a bind address the listener is the only receiver and any
    /// session is send-only.
    pub fn receives_via_session(&self) -> bool {
        self.session.is_some() && self.webhook_bind.is_none()
    }
}

fn session_auth(config: &MattermostConfig) -> Option<SessionAuth> {
    if !config.token.is_empty() {
        Some(SessionAuth::Token)
    } else if !config.login.is_empty() {
        Some(SessionAuth::Password)
    } else {
        None
    }
}

/// Pick the transports for a configuration.
///
/// A bind address wins over a webhook URL, which wins over a token, which
/// wins over a login.
pub fn resolve(config: &MattermostConfig) -> Result<ConnectionPlan> {
    let webhook_url = config.webhook_url().map(str::to_string);

    if let Some(bind) = config.webhook_bind_address() {
        let session = if webhook_url.is_some() {
            info!("Connecting using webhookurl (sending) and webhookbindaddress (receiving)");
            None
        } else {
            match session_auth(config) {
                Some(SessionAuth::Token) => info!("Connecting using token (sending)"),
                Some(SessionAuth::Password) => info!("Connecting using login/password (sending)"),
                None => info!("Connecting using webhookbindaddress (receiving)"),
            }
            session_auth(config)
        };
        return Ok(ConnectionPlan {
            mode: ConnectionMode::WebhookBind,
            webhook_url,
            webhook_bind: Some(bind.to_string()),
            session,
        });
    }

    if webhook_url.is_some() {
        info!("Connecting using webhookurl (sending)");
        let session = session_auth(config);
        match session {
            Some(SessionAuth::Token) => info!("Connecting using token (receiving)"),
            Some(SessionAuth::Password) => info!("Connecting using login/password (receiving)"),
            None => {}
        }
        return Ok(ConnectionPlan {
            mode: ConnectionMode::WebhookUrl,
            webhook_url,
            webhook_bind: None,
            session,
        });
    }

    let (mode, auth) = match session_auth(config) {
        Some(SessionAuth::Token) => (ConnectionMode::SessionToken, SessionAuth::Token),
        Some(SessionAuth::Password) => (ConnectionMode::SessionLogin, SessionAuth::Password),
        None => return Err(BridgeError::Config("no connection method found".to_string())),
    };
    info!("Connecting using {}", mode);

    Ok(ConnectionPlan {
        mode,
        webhook_url: None,
        webhook_bind: None,
        session: Some(auth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::SecretString;

    fn config() -> MattermostConfig {
        MattermostConfig::default()
    }

    #[test]
    fn test_webhook_url_and_token_is_dual_mode() {
        let cfg = MattermostConfig {
            webhook_url: Some("https://mm/hooks/abc".into()),
            token: SecretString::new("tok"),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::WebhookUrl);
        assert!(plan.sends_via_webhook());
        assert_eq!(plan.session, Some(SessionAuth::Token));
        assert_eq!(plan.webhook_bind, None);
    }

    #[test]
    fn test_webhook_url_alone() {
        let cfg = MattermostConfig {
            webhook_url: Some("https://mm/hooks/abc".into()),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::WebhookUrl);
        assert!(!plan.has_session());
    }

    #[test]
    fn test_bind_with_url_skips_session() {
        let cfg = MattermostConfig {
            webhook_bind_address: Some("0.0.0.0:9999".into()),
            webhook_url: Some("https://mm/hooks/abc".into()),
            token: SecretString::new("tok"),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::WebhookBind);
        assert_eq!(plan.webhook_bind.as_deref(), Some("0.0.0.0:9999"));
        assert!(plan.sends_via_webhook());
        assert!(!plan.has_session());
    }

    #[test]
    fn test_bind_with_login_sends_via_session() {
        let cfg = MattermostConfig {
            webhook_bind_address: Some("127.0.0.1:9999".into()),
            login: "bot".into(),
            password: SecretString::new("pw"),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::WebhookBind);
        assert_eq!(plan.session, Some(SessionAuth::Password));
        assert!(!plan.sends_via_webhook());
        assert!(!plan.receives_via_session());
    }

    #[test]
    fn test_session_receives_only_without_bind() {
        let dual = MattermostConfig {
            webhook_url: Some("https://mm/hooks/abc".into()),
            token: SecretString::new("tok"),
            ..config()
        };
        assert!(resolve(&dual).unwrap().receives_via_session());

        let login = MattermostConfig {
            login: "bot".into(),
            ..config()
        };
        assert!(resolve(&login).unwrap().receives_via_session());

        let bind_token = MattermostConfig {
            webhook_bind_address: Some("127.0.0.1:9999".into()),
            token: SecretString::new("tok"),
            ..config()
        };
        let plan = resolve(&bind_token).unwrap();
        assert!(plan.has_session());
        assert!(!plan.receives_via_session());

        let hooks_only = MattermostConfig {
            webhook_url: Some("https://mm/hooks/abc".into()),
            ..config()
        };
        assert!(!resolve(&hooks_only).unwrap().receives_via_session());
    }

    #[test]
    fn test_bind_alone_is_webhook_only() {
        let cfg = MattermostConfig {
            webhook_bind_address: Some("127.0.0.1:9999".into()),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::WebhookBind);
        assert!(!plan.has_session());
        assert!(!plan.sends_via_webhook());
    }

    #[test]
    fn test_token_beats_login() {
        let cfg = MattermostConfig {
            token: SecretString::new("tok"),
            login: "bot".into(),
            ..config()
        };
        let plan = resolve(&cfg).unwrap();
        assert_eq!(plan.mode, ConnectionMode::SessionToken);
        assert_eq!(plan.session, Some(SessionAuth::Token));
    }

    #[test]
    fn test_login_only() {
        let cfg = MattermostConfig {
            login: "bot".into(),
            ..config()
        };
        assert_eq!(resolve(&cfg).unwrap().mode, ConnectionMode::SessionLogin);
    }

    #[test]
    fn test_nothing_configured() {
        let err = resolve(&config()).unwrap_err();
        assert!(matches!(err, BridgeError::Config(ref m) if m == "no connection method found"));
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let cfg = MattermostConfig {
            webhook_url: Some(String::new()),
            webhook_bind_address: Some(String::new()),
            login: "bot".into(),
            ..config()
        };
        assert_eq!(resolve(&cfg).unwrap().mode, ConnectionMode::SessionLogin);
    }
}
