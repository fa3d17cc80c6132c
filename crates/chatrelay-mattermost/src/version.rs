//! Server version detection.

use crate::session::SchemaRevision;
use reqwest::Client;
use semver::Version;
use tracing::{debug, error};

/// Response header carrying the server build.
pub const VERSION_HEADER: &str = "X-Version-Id";

/// First major version served by the modern schema.
pub const MODERN_MAJOR: u64 = 6;

/// Parse the leading `major.minor.patch` of an `X-Version-Id` value such as
/// `6.3.0.6.3.0.abc123.false`.
pub fn parse_server_version(raw: &str) -> Option<Version> {
    let mut parts = raw.trim().splitn(4, '.');
    let (major, minor, patch) = (parts.next()?, parts.next()?, parts.next()?);
    Version::parse(&format!("{}.{}.{}", major, minor, patch)).ok()
}

impl SchemaRevision {
    /// Revision matching a reported server version, `None` if unparseable.
    pub fn from_server_version(raw: &str) -> Option<Self> {
        let version = parse_server_version(raw)?;
        if version.major >= MODERN_MAJOR {
            Some(Self::Modern)
        } else {
            Some(Self::Legacy)
        }
    }
}

/// Ask the server for its version.
///
/// Returns `None` when the request fails or the header is missing.
pub async fn probe_server_version(client: &Client, server: &str, no_tls: bool) -> Option<String> {
    let scheme = if no_tls { "http" } else { "https" };
    let url = format!("{}://{}", scheme, server);

    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            error!("failed getting version: {}", e);
            return None;
        }
    };

    let version = response
        .headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    debug!("Server {} reports version {:?}", server, version);
    version
}
