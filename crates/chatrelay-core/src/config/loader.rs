//! Configuration loading and persistence.

use super::Config;
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use crate::secret::SecretString;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path, applying environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Replace credentials with values from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = env::get_var(env::vars::MATTERMOST_TOKEN) {
            self.mattermost.token = SecretString::new(token);
        }
        if let Some(password) = env::get_var(env::vars::MATTERMOST_PASSWORD) {
            self.mattermost.password = SecretString::new(password);
        }
        if let Some(debug) = env::get_bool(env::vars::CHATRELAY_DEBUG) {
            self.mattermost.debug = debug;
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mm = &self.mattermost;

        // 1. Some connection method must exist
        if !mm.is_webhook_client() && !mm.has_session_credentials() {
            errors.push(
                "No connection method found: set webhook_bind_address, webhook_url or token/login"
                    .to_string(),
            );
        }

        // 2. Webhook URL must be absolute http(s)
        if let Some(webhook_url) = mm.webhook_url() {
            match url::Url::parse(webhook_url) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                Ok(u) => errors.push(format!(
                    "webhook_url must use http or https, got '{}'",
                    u.scheme()
                )),
                Err(e) => errors.push(format!("Invalid webhook_url '{}': {}", webhook_url, e)),
            }
        }

        // 3. Bind address must be host:port
        if let Some(bind) = mm.webhook_bind_address() {
            if bind.parse::<SocketAddr>().is_err() {
                errors.push(format!(
                    "Invalid webhook_bind_address '{}', expected host:port",
                    bind
                ));
            }
        }

        // 4. Session credentials need a server and a team
        if mm.has_session_credentials() {
            if mm.server.is_empty() {
                errors.push("Session login requires 'server'".to_string());
            } else if url::Url::parse(&format!("https://{}", mm.server)).is_err() {
                errors.push(format!("Invalid server '{}'", mm.server));
            }
            if mm.team.is_empty() {
                errors.push("Session login requires 'team'".to_string());
            }
            if mm.token.is_empty() && mm.password.is_empty() {
                errors.push(format!("Login '{}' has no password", mm.login));
            }
        }

        // 5. Media server URL must parse
        if let Some(download) = &self.general.media_server_download {
            if url::Url::parse(download).is_err() {
                errors.push(format!("Invalid media_server_download '{}'", download));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
