//! End-to-end tests of the adapter over a session client.
//!
//! The session client is faked; everything between it and the relay bus is
//! the real adapter.

use chatrelay_core::config::MattermostConfig;
use chatrelay_core::{Event, InstanceId, Message, SecretString};
use chatrelay_integration_tests::{posted, FakeConnector, FakeLegacyClient, BOT_USERNAME};
use chatrelay_mattermost::{BridgeBuilder, ConnectionMode, MattermostBridge, SchemaRevision};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const INSTANCE: &str = "e2e-instance";

fn login_config() -> MattermostConfig {
    MattermostConfig {
        name: "work".into(),
        server: "chat.example.com".into(),
        team: "dev".into(),
        login: BOT_USERNAME.into(),
        password: SecretString::new("hunter2"),
        prefix_messages_with_nick: true,
        ..Default::default()
    }
}

async fn start(
    config: MattermostConfig,
) -> (
    MattermostBridge,
    Arc<FakeLegacyClient>,
    mpsc::Sender<chatrelay_mattermost::session::legacy::Message>,
    mpsc::Receiver<Message>,
) {
    let (client, events) = FakeLegacyClient::new(&[("town-square", "chan-1")]);
    let (remote, inbound) = mpsc::channel(16);
    let bridge = BridgeBuilder::new(config)
        .instance_id(InstanceId::from(INSTANCE))
        .revision(SchemaRevision::Legacy)
        .connector(Arc::new(FakeConnector { client: client.clone() }))
        .connect(remote)
        .await
        .unwrap();
    (bridge, client, events, inbound)
}

async fn next(inbound: &mut mpsc::Receiver<Message>) -> Message {
    timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("message within timeout")
        .expect("relay bus open")
}

#[tokio::test]
async fn test_password_session_round_trip() {
    let (bridge, client, events, mut inbound) = start(login_config()).await;
    assert_eq!(bridge.mode(), ConnectionMode::SessionLogin);
    assert_eq!(bridge.revision(), Some(SchemaRevision::Legacy));

    let credentials = client.credentials.lock().clone().unwrap();
    assert_eq!(credentials.password.expose_secret(), "hunter2");

    // outbound
    let id = bridge
        .send(&Message::new("bob", ": hi", "town-square"))
        .await
        .unwrap();
    assert_eq!(id, "post-1");
    let sent = client.posts.lock()[0].clone();
    assert_eq!(sent.channel_id, "chan-1");
    assert_eq!(sent.text, "bob: hi");
    assert_eq!(sent.props.get("matterbridge_e2e-instance"), Some(&json!(true)));

    // the server echoes our post back; it must not reach the bus
    let echo = posted("town-square", "bob", "bob: hi", json!(sent.props));
    events.send(echo).await.unwrap();
    events
        .send(posted("town-square", "alice", "hello bridge", json!({})))
        .await
        .unwrap();

    let msg = next(&mut inbound).await;
    assert_eq!(msg.username, "alice");
    assert_eq!(msg.text, "hello bridge");
    assert_eq!(msg.channel, "town-square");
    assert_eq!(msg.account, "mattermost.work");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_token_session_uses_token_password() {
    let config = MattermostConfig {
        token: SecretString::new("pat"),
        ..login_config()
    };
    let (bridge, client, _events, _inbound) = start(config).await;
    assert_eq!(bridge.mode(), ConnectionMode::SessionToken);

    let credentials = client.credentials.lock().clone().unwrap();
    assert_eq!(credentials.password.expose_secret(), "token=pat");
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_join_leave_and_foreign_team() {
    let (bridge, _client, events, mut inbound) = start(login_config()).await;

    let mut foreign = posted("town-square", "mallory", "other team", json!({}));
    foreign.raw.data.insert("team_id".into(), json!("team-2"));
    events.send(foreign).await.unwrap();

    let mut joined = posted("town-square", "carol", "carol joined the channel.", json!({}));
    joined.msg_type = "system_join_channel".into();
    events.send(joined).await.unwrap();

    let msg = next(&mut inbound).await;
    assert_eq!(msg.event, Event::JoinLeave);
    assert_eq!(msg.username, "system");
    assert_eq!(msg.text, "carol joined the channel.");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_no_send_join_part() {
    let config = MattermostConfig {
        no_send_join_part: true,
        ..login_config()
    };
    let (bridge, _client, events, mut inbound) = start(config).await;

    let mut left = posted("town-square", "carol", "carol left the channel.", json!({}));
    left.msg_type = "system_leave_channel".into();
    events.send(left).await.unwrap();
    events
        .send(posted("town-square", "dave", "still here", json!({})))
        .await
        .unwrap();

    let msg = next(&mut inbound).await;
    assert_eq!(msg.text, "still here");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_header_sync() {
    let (bridge, client, _events, _inbound) = start(login_config()).await;

    let notice = Message::new(
        "<alice> ",
        "alice updated the channel header from: old to: release day ",
        "town-square",
    )
    .with_event(Event::TopicChange);
    bridge.send(&notice).await.unwrap();

    assert_eq!(
        client.headers.lock().clone(),
        vec![("chan-1".to_string(), "release day".to_string())]
    );
    assert!(client.posts.lock().is_empty());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_relay_bus() {
    let (bridge, _client, _events, mut inbound) = start(login_config()).await;
    bridge.shutdown().await;
    drop(bridge);

    let closed = timeout(Duration::from_secs(5), inbound.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_bind_with_login_delivers_inbound_once() {
    let config = MattermostConfig {
        webhook_bind_address: Some("127.0.0.1:0".into()),
        ..login_config()
    };
    let (bridge, client, events, mut inbound) = start(config).await;
    assert_eq!(bridge.mode(), ConnectionMode::WebhookBind);
    let addr = bridge.webhook_addr().unwrap();

    // Mattermost fires both the outgoing webhook and the websocket event
    // for the same post.
    events
        .send(posted("town-square", "alice", "hello", json!({})))
        .await
        .unwrap();
    let response = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .form(&[
            ("token", "tok"),
            ("team_id", "team-1"),
            ("channel_name", "town-square"),
            ("user_id", "id-alice"),
            ("user_name", "alice"),
            ("post_id", "in-5"),
            ("text", "hello"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let msg = next(&mut inbound).await;
    assert_eq!(msg.username, "alice");
    assert_eq!(msg.text, "hello");
    assert!(
        timeout(Duration::from_millis(300), inbound.recv()).await.is_err(),
        "post delivered twice"
    );

    // the session still carries outbound traffic
    bridge
        .send(&Message::new("bob", ": hi", "town-square"))
        .await
        .unwrap();
    assert_eq!(client.posts.lock().len(), 1);

    bridge.shutdown().await;
}
