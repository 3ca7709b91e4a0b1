//! Plugin catalog service.
//!
//! Fetches the installed, cloud, featured and storefront lists concurrently
//! and publishes the result as a new [`CatalogSnapshot`]. Readers grab the
//! current `Arc` and never see a half-applied reload.

use std::sync::Arc;

use parking_lot::RwLock;
use pedalboard_core::catalog::{CatalogSnapshot, LicenseManager, PluginView};
use pedalboard_core::protocol::RescanReport;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::api::CatalogSource;
use crate::ui::{Notification, UiEvent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("installed plugin list unavailable: {message}")]
    LocalUnavailable { message: String },
}

pub struct Catalog<S: CatalogSource> {
    source: Arc<S>,
    licenses: Arc<dyn LicenseManager>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes reloads; readers never take it
    reload: Mutex<()>,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl<S: CatalogSource> Catalog<S> {
    pub fn new(
        source: Arc<S>,
        licenses: Arc<dyn LicenseManager>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            source,
            licenses,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            reload: Mutex::new(()),
            ui,
        }
    }

    /// Current snapshot. Stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().clone()
    }

    pub async fn load_all(&self) -> Result<(), CatalogError> {
        self.reload(false).await
    }

    /// Refetch the sources and swap in a new snapshot.
    ///
    /// Installed and storefront lists are always fetched; cloud and featured
    /// lists only when not loaded yet or when `force` is set. A failed
    /// optional source keeps its previous records.
    pub async fn reload(&self, force: bool) -> Result<(), CatalogError> {
        let _guard = self.reload.lock().await;
        let previous = self.snapshot();
        let mut sources = previous.sources().clone();
        let fetch_cloud = force || !sources.flags.cloud_loaded;
        let fetch_featured = force || !sources.flags.featured_loaded;

        let (local, cloud, featured, store) = tokio::join!(
            self.source.installed(),
            async {
                if fetch_cloud {
                    Some(self.source.cloud().await)
                } else {
                    None
                }
            },
            async {
                if fetch_featured {
                    Some(self.source.featured().await)
                } else {
                    None
                }
            },
            self.source.storefront(),
        );

        match cloud {
            Some(Ok(cloud)) => {
                sources.cloud = cloud;
                sources.flags.cloud_loaded = true;
            }
            Some(Err(e)) => debug!("Cloud catalog unavailable: {:#}", e),
            None => {}
        }
        match featured {
            Some(Ok(featured)) => {
                sources.featured = featured;
                sources.flags.featured_loaded = true;
            }
            Some(Err(e)) => debug!("Featured list unavailable: {:#}", e),
            None => {}
        }
        match store {
            Ok(store) => sources.store = store,
            Err(e) => debug!("Storefront unavailable: {:#}", e),
        }
        let local_error = match local {
            Ok(local) => {
                sources.local = local;
                sources.flags.local_loaded = true;
                None
            }
            Err(e) => {
                sources.flags.local_loaded = false;
                Some(format!("{:#}", e))
            }
        };

        let snapshot = Arc::new(CatalogSnapshot::new(sources));
        let count = snapshot.len();
        *self.snapshot.write() = snapshot;

        if let Some(message) = local_error {
            warn!("Failed to load installed plugins: {}", message);
            self.notify(Notification::blocking_error(format!(
                "Failed to load the installed plugin list: {}",
                message
            )));
            return Err(CatalogError::LocalUnavailable { message });
        }
        info!("Catalog loaded: {} plugins", count);
        Ok(())
    }

    /// Apply a device rescan: drop removed plugins, then refetch if new
    /// ones were installed.
    pub async fn apply_rescan(&self, report: &RescanReport) -> Result<(), CatalogError> {
        if !report.removed.is_empty() {
            let _guard = self.reload.lock().await;
            let mut sources = self.snapshot().sources().clone();
            sources
                .local
                .retain(|plugin| !report.removed.contains(&plugin.uri));
            *self.snapshot.write() = Arc::new(CatalogSnapshot::new(sources));
            debug!("Dropped {} removed plugins", report.removed.len());
        }
        if report.installed.is_empty() {
            return Ok(());
        }
        self.reload(false).await
    }

    /// Merged view of `uri`. Warns once per call when the license manager
    /// knows a license the device does not.
    pub fn get_plugin(&self, uri: &str) -> Option<PluginView> {
        let view = self.snapshot().get_plugin(uri, self.licenses.as_ref())?;
        if view.license_mismatch {
            warn!("{} is licensed but the device does not know it yet", uri);
            self.notify(Notification::warning(format!(
                "The license for {} is not active on the device yet. Reload the plugin list to refresh it.",
                view.name
            )));
        }
        Some(view)
    }

    pub fn plugins(&self) -> Vec<PluginView> {
        self.snapshot().plugins(self.licenses.as_ref())
    }

    pub fn featured(&self) -> Vec<PluginView> {
        self.snapshot().featured(self.licenses.as_ref())
    }

    fn notify(&self, notification: Notification) {
        let _ = self.ui.send(UiEvent::Notification(notification));
    }
}
