//! Websocket connection to the device, reconnecting until the router stops.

use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::router::{RouterEvent, RouterHandle};

/// Websocket URL for a device base URL, e.g. `http://host:8888` ->
/// `ws://host:8888/websocket`.
pub fn websocket_url(device: &str, path: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(device)
        .with_context(|| format!("invalid device URL '{}'", device))?
        .join(path)
        .with_context(|| format!("invalid websocket path '{}'", path))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(anyhow!("unsupported scheme '{}'", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot use scheme '{}' for {}", scheme, url))?;
    Ok(url)
}

/// Forward frames to the router and `outgoing` messages to the device.
///
/// Returns once the router or the outgoing channel is gone. Connection
/// failures are retried after `reconnect_delay`.
pub async fn run_socket(
    url: Url,
    router: RouterHandle,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    reconnect_delay: Duration,
) -> anyhow::Result<()> {
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("Connected to {}", url);
                if !router.send(RouterEvent::ConnectionChanged(true)) {
                    return Ok(());
                }
                let (mut write, mut read) = stream.split();

                loop {
                    tokio::select! {
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                if !router.frame(text) {
                                    return Ok(());
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Device closed the connection");
                                break;
                            }
                            Some(Ok(other)) => debug!("Ignoring non-text message: {:?}", other),
                            Some(Err(e)) => {
                                warn!("Websocket error: {}", e);
                                break;
                            }
                        },
                        reply = outgoing.recv() => match reply {
                            Some(text) => {
                                if let Err(e) = write.send(Message::Text(text)).await {
                                    warn!("Failed to send to device: {}", e);
                                    break;
                                }
                            }
                            None => {
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        },
                    }
                }

                if !router.send(RouterEvent::ConnectionChanged(false)) {
                    return Ok(());
                }
            }
            Err(e) => warn!(
                "Failed to connect to {}: {}. Retrying in {:?}...",
                url, e, reconnect_delay
            ),
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}
