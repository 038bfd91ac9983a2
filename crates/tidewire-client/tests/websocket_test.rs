//! End-to-end run against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use tidewire_client::{
    ConnectionState, NoopObserver, Session, SessionObserver, TimerService, WebSocketTransport,
};
use tidewire_core::config::ClientConfig;

const WAIT: Duration = Duration::from_secs(5);

struct NotifyingObserver {
    connected: Notify,
    disconnected: Notify,
}

impl SessionObserver for NotifyingObserver {
    fn on_connected(&self) {
        self.connected.notify_one();
    }

    fn on_disconnected(&self) {
        self.disconnected.notify_one();
    }
}

/// Accepts one client: handshake, a welcome event, pongs, and an `add` method.
async fn serve_one(listener: TcpListener, pings: mpsc::UnboundedSender<()>) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(tcp).await.unwrap();

    ws.send(Message::text(
        r#"0{"sid":"e2e","pingInterval":100,"pingTimeout":1000,"upgrades":[]}"#,
    ))
    .await
    .unwrap();
    ws.send(Message::text(r#"4chat|["welcome"]"#)).await.unwrap();

    while let Some(Ok(frame)) = ws.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        let text = text.as_str();

        if let Some(payload) = text.strip_prefix('2') {
            let _ = pings.send(());
            ws.send(Message::text(format!("3{payload}"))).await.unwrap();
        } else if let Some(body) = text.strip_prefix("4rpc|") {
            let call: Value = serde_json::from_str(body).unwrap();
            let sum = call["p"][0].as_i64().unwrap() + call["p"][1].as_i64().unwrap();
            let reply = json!({ "id": call["id"], "p": [sum] });
            ws.send(Message::text(format!("4rpc|{reply}"))).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_session_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (ping_tx, mut ping_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_one(listener, ping_tx));

    let observer = Arc::new(NotifyingObserver {
        connected: Notify::new(),
        disconnected: Notify::new(),
    });
    let dyn_observer: Arc<dyn SessionObserver> = observer.clone();
    let session = Session::spawn(
        &ClientConfig::default(),
        Arc::new(WebSocketTransport::new()),
        TimerService::new(),
        Arc::downgrade(&dyn_observer),
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    session
        .bind("chat", move |params| {
            let _ = event_tx.send(params);
        })
        .unwrap();
    session.connect("127.0.0.1", port, false);

    timeout(WAIT, observer.connected.notified()).await.unwrap();
    let welcome = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert_eq!(welcome, vec![json!("welcome")]);

    let sum = timeout(WAIT, session.call("add", vec![json!(2), json!(3)]))
        .await
        .unwrap();
    assert_eq!(sum, Ok(vec![json!(5)]));

    for _ in 0..3 {
        timeout(WAIT, ping_rx.recv()).await.unwrap().unwrap();
    }
    assert_eq!(session.state(), ConnectionState::Connected);

    session.disconnect();
    timeout(WAIT, observer.disconnected.notified()).await.unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreachable_server_reports_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = ClientConfig::default();
    config.reconnect.enabled = false;
    let session = Session::spawn(
        &config,
        Arc::new(WebSocketTransport::new()),
        TimerService::new(),
        std::sync::Weak::<NoopObserver>::new(),
    );
    let mut state = session.subscribe_state();

    session.connect("127.0.0.1", port, false);
    timeout(
        WAIT,
        state.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(session.metrics().connects, 0);
}
