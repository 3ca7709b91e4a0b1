use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pedalboard_core::catalog::{LicenseManager, LicenseSet, NoLicenses};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod catalog;
pub mod headless;
pub mod router;
pub mod ui;
pub mod ws;

pub use api::{CatalogSource, DeviceApi, HttpApi};
pub use catalog::{Catalog, CatalogError};
pub use headless::HeadlessCanvas;
pub use router::{Router, RouterConfig, RouterEvent, RouterHandle, router_channel};
pub use ui::{Notification, NotificationLevel, UiEvent};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the device's HTTP server
    pub device_url: String,
    pub websocket_path: String,
    /// Cloud catalog base URL; `None` runs offline
    pub cloud_url: Option<String>,
    pub store_url: Option<String>,
    /// JSON array of licensed plugin URIs
    pub license_file: Option<PathBuf>,
    pub data_ready_debounce: Duration,
    pub xrun_alert_window: Duration,
    pub reconnect_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_url: "http://127.0.0.1:8888".to_string(),
            websocket_path: "/websocket".to_string(),
            cloud_url: None,
            store_url: None,
            license_file: None,
            data_ready_debounce: Duration::from_millis(50),
            xrun_alert_window: Duration::from_millis(500),
            reconnect_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            data_ready_debounce: self.data_ready_debounce,
            xrun_alert_window: self.xrun_alert_window,
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// License manager for `path`, or one that knows no licenses.
pub fn load_licenses(path: Option<&Path>) -> anyhow::Result<Arc<dyn LicenseManager>> {
    let Some(path) = path else {
        return Ok(Arc::new(NoLicenses));
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read license file {}", path.display()))?;
    let licenses = LicenseSet::from_json(&json)
        .with_context(|| format!("invalid license file {}", path.display()))?;
    tracing::info!("Loaded {} licenses from {}", licenses.len(), path.display());
    Ok(Arc::new(licenses))
}

/// Build a catalog over the configured sources without loading it.
pub fn create_catalog(
    config: &ClientConfig,
    ui: mpsc::UnboundedSender<UiEvent>,
) -> anyhow::Result<Arc<Catalog<HttpApi>>> {
    let api = Arc::new(HttpApi::new(config)?);
    let licenses = load_licenses(config.license_file.as_deref())?;
    Ok(Arc::new(Catalog::new(api, licenses, ui)))
}

/// Mirror the device until Ctrl-C.
pub async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let api = Arc::new(HttpApi::new(&config)?);
    let licenses = load_licenses(config.license_file.as_deref())?;
    let ws_url = ws::websocket_url(&config.device_url, &config.websocket_path)?;

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let (device_tx, device_rx) = mpsc::unbounded_channel();
    let (handle, router_rx) = router_channel();

    let catalog = Arc::new(Catalog::new(api.clone(), licenses, ui_tx.clone()));
    let router = Router::new(
        api,
        handle.clone(),
        ui_tx,
        device_tx,
        config.router_config(),
    );

    let router_task = tokio::spawn(router.run(router_rx));
    let socket_task = tokio::spawn(ws::run_socket(
        ws_url.clone(),
        handle.clone(),
        device_rx,
        config.reconnect_delay,
    ));
    tokio::spawn({
        let catalog = catalog.clone();
        async move {
            if let Err(e) = catalog.load_all().await {
                tracing::error!("{}", e);
            }
        }
    });

    tracing::info!("Mirroring {}", ws_url);
    let mut canvas = HeadlessCanvas::new(handle.clone());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = ui_rx.recv() => {
                let Some(event) = event else { break };
                if let UiEvent::RescanCompleted(report) = &event {
                    let catalog = catalog.clone();
                    let report = report.clone();
                    tokio::spawn(async move {
                        if let Err(e) = catalog.apply_rescan(&report).await {
                            tracing::warn!("Rescan refresh failed: {}", e);
                        }
                    });
                }
                canvas.handle(&event);
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    handle.shutdown();
    socket_task.abort();
    router_task.await.context("router task failed")?;
    Ok(())
}
