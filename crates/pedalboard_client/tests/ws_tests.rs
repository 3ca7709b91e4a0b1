use std::io::Write;
use std::time::Duration;

use axum::Router;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::routing::get;
use pedalboard_client::{RouterEvent, load_licenses, router_channel, ws};
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn device_socket(mut socket: WebSocket, replies: mpsc::UnboundedSender<String>) {
    if socket.send(Message::Text("ping".to_string())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            let _ = replies.send(text);
        }
    }
}

async fn spawn_device(replies: mpsc::UnboundedSender<String>) -> String {
    let app = Router::new().route(
        "/websocket",
        get(move |ws: WebSocketUpgrade| {
            let replies = replies.clone();
            async move { ws.on_upgrade(move |socket| device_socket(socket, replies)) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_socket_forwards_both_ways() {
    let (replies_tx, mut replies_rx) = mpsc::unbounded_channel();
    let device = spawn_device(replies_tx).await;
    let url = ws::websocket_url(&device, "/websocket").unwrap();

    let (handle, mut events) = router_channel();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let socket = tokio::spawn(ws::run_socket(
        url,
        handle,
        outgoing_rx,
        Duration::from_millis(50),
    ));

    let wait = Duration::from_secs(5);
    let first = timeout(wait, events.recv()).await.unwrap().unwrap();
    assert!(matches!(first, RouterEvent::ConnectionChanged(true)));
    let second = timeout(wait, events.recv()).await.unwrap().unwrap();
    assert!(matches!(second, RouterEvent::Frame(ref text) if text == "ping"));

    outgoing_tx.send("pong".to_string()).unwrap();
    let reply = timeout(wait, replies_rx.recv()).await.unwrap().unwrap();
    assert_eq!(reply, "pong");

    drop(outgoing_tx);
    timeout(wait, socket).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_socket_stops_with_router() {
    let (replies_tx, _replies_rx) = mpsc::unbounded_channel();
    let device = spawn_device(replies_tx).await;
    let url = ws::websocket_url(&device, "/websocket").unwrap();

    let (handle, events) = router_channel();
    drop(events);
    let (_outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    let result = timeout(
        Duration::from_secs(5),
        ws::run_socket(url, handle, outgoing_rx, Duration::from_millis(50)),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
}

#[test]
fn test_load_licenses() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"["urn:a", "urn:b"]"#).unwrap();
    let licenses = load_licenses(Some(file.path())).unwrap();
    assert!(licenses.is_licensed("urn:a"));
    assert!(!licenses.is_licensed("urn:c"));

    assert!(!load_licenses(None).unwrap().is_licensed("urn:a"));

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    write!(broken, "not json").unwrap();
    assert!(load_licenses(Some(broken.path())).is_err());
}
