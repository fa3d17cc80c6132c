//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> Option<bool> {
    get_var(name).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Environment variable names read by chatrelay.
pub mod vars {
    /// Base directory override.
    pub const CHATRELAY_HOME: &str = "CHATRELAY_HOME";

    /// Config file override.
    pub const CHATRELAY_CONFIG: &str = "CHATRELAY_CONFIG";

    /// Mattermost session token, overrides `mattermost.token`.
    pub const MATTERMOST_TOKEN: &str = "CHATRELAY_MATTERMOST_TOKEN";

    /// Mattermost password, overrides `mattermost.password`.
    pub const MATTERMOST_PASSWORD: &str = "CHATRELAY_MATTERMOST_PASSWORD";

    /// Enables debug logging of the session client.
    pub const CHATRELAY_DEBUG: &str = "CHATRELAY_DEBUG";
}
