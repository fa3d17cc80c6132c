//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be written to disk, loaded
//! back, and fed to the connection resolver.

use chatrelay_core::config::{ApiRevision, Config};
use chatrelay_mattermost::connect::{self, ConnectionMode};
use chatrelay_mattermost::SessionAuth;
use std::path::Path;
use tempfile::TempDir;

const MATTERBRIDGE_STYLE: &str = r#"{
    // keys as they appear in a converted matterbridge config
    general: { MediaServerDownload: "https://media.example.com", MediaDownloadSize: 2000000 },
    mattermost: {
        name: "work",
        Server: "chat.example.com",
        Team: "dev",
        Login: "relaybot",
        Token: "s3cret",
        WebhookURL: "https://chat.example.com/hooks/abc",
        PrefixMessagesWithNick: true,
        nosendjoinpart: true,
        EditSuffix: " (edited)",
        IconURL: "https://icons.example.com/{NICK}.png",
    },
}"#;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chatrelay.json5");

    let config = Config::parse(MATTERBRIDGE_STYLE).unwrap();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.mattermost.name, "work");
    assert_eq!(loaded.mattermost.token.expose_secret(), "s3cret");
    assert_eq!(loaded.mattermost.webhook_url(), config.mattermost.webhook_url());
    assert!(loaded.mattermost.prefix_messages_with_nick);
    assert!(loaded.mattermost.no_send_join_part);
    assert_eq!(loaded.mattermost.edit_suffix, " (edited)");
    assert_eq!(loaded.mattermost.api_revision, ApiRevision::Auto);
    assert_eq!(loaded.general.media_download_size, 2_000_000);
    loaded.validate().unwrap();
}

#[test]
fn test_loaded_config_resolves_dual_mode() {
    let config = Config::parse(MATTERBRIDGE_STYLE).unwrap();
    let plan = connect::resolve(&config.mattermost).unwrap();

    assert_eq!(plan.mode, ConnectionMode::WebhookUrl);
    assert_eq!(plan.webhook_url.as_deref(), Some("https://chat.example.com/hooks/abc"));
    assert_eq!(plan.session, Some(SessionAuth::Token));
}

#[test]
fn test_config_without_connection_method() {
    let config = Config::parse("{ mattermost: { name: \"empty\" } }").unwrap();
    assert!(config.validate().is_err());
    assert!(connect::resolve(&config.mattermost).is_err());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/chatrelay.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}
