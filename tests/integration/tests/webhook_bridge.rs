//! End-to-end tests of the webhook transports over real HTTP on loopback.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::config::MattermostConfig;
use chatrelay_core::{FileInfo, InstanceId, Message, EXTRA_FILE};
use chatrelay_mattermost::{BridgeBuilder, ConnectionMode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Stand-in for Mattermost's incoming-webhook endpoint.
async fn capture_server() -> (String, mpsc::Receiver<Value>) {
    let (tx, rx) = mpsc::channel(8);
    let app = Router::new()
        .route(
            "/hooks/abc",
            post(
                |State(tx): State<mpsc::Sender<Value>>, Json(body): Json<Value>| async move {
                    let _ = tx.send(body).await;
                    StatusCode::OK
                },
            ),
        )
        .with_state(tx);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hooks/abc", addr), rx)
}

async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("received within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn test_webhook_url_outbound() {
    let (url, mut captured) = capture_server().await;
    let config = MattermostConfig {
        name: "hooks".into(),
        webhook_url: Some(url),
        prefix_messages_with_nick: true,
        icon_url: Some("https://icons.example.com/{PROTOCOL}/{NICK}.png".into()),
        ..Default::default()
    };

    let (remote, _inbound) = mpsc::channel(1);
    let bridge = BridgeBuilder::new(config)
        .instance_id(InstanceId::from("hook-instance"))
        .connect(remote)
        .await
        .unwrap();
    assert_eq!(bridge.mode(), ConnectionMode::WebhookUrl);

    let msg = Message::new("bob", ": see ", "town-square")
        .with_account("irc.libera")
        .with_extra(EXTRA_FILE, FileInfo::new("cat.png").with_url("https://media/cat.png"));
    bridge.send(&msg).await.unwrap();

    let body = recv(&mut captured).await;
    assert_eq!(
        body,
        json!({
            "channel": "town-square",
            "icon_url": "https://icons.example.com/irc/bob.png",
            "username": "bob",
            "text": "bob: see https://media/cat.png",
            "props": { "matterbridge_hook-instance": true },
        })
    );

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_webhook_send_failure_is_returned() {
    let config = MattermostConfig {
        webhook_url: Some("http://127.0.0.1:1/hooks/none".into()),
        ..Default::default()
    };
    let (remote, _inbound) = mpsc::channel(1);
    let bridge = BridgeBuilder::new(config).connect(remote).await.unwrap();

    let result = bridge.send(&Message::new("bob", "hi", "town-square")).await;
    assert!(result.is_err());
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_webhook_bind_inbound() {
    let (url, _captured) = capture_server().await;
    let config = MattermostConfig {
        name: "hooks".into(),
        webhook_url: Some(url),
        webhook_bind_address: Some("127.0.0.1:0".into()),
        ..Default::default()
    };

    let (remote, mut inbound) = mpsc::channel(4);
    let bridge = BridgeBuilder::new(config).connect(remote).await.unwrap();
    assert_eq!(bridge.mode(), ConnectionMode::WebhookBind);
    let addr = bridge.webhook_addr().unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .form(&[
            ("token", "tok"),
            ("team_id", "team-1"),
            ("channel_name", "town-square"),
            ("user_id", "u1"),
            ("user_name", "alice"),
            ("post_id", "p1"),
            ("text", "from the hook"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let msg = recv(&mut inbound).await;
    assert_eq!(msg.username, "alice");
    assert_eq!(msg.channel, "town-square");
    assert_eq!(msg.text, "from the hook");
    assert_eq!(msg.account, "mattermost.hooks");

    bridge.shutdown().await;
}
