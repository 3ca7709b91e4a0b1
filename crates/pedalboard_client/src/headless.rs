//! Canvas stand-in for running without a renderer.
//!
//! Logs every UI event and reports plugin nodes as created as soon as they
//! are added, which is what a real canvas does once it has drawn them.

use pedalboard_core::binder::BindingKey;
use tracing::{debug, error, info, warn};

use crate::router::RouterHandle;
use crate::ui::{NotificationLevel, UiEvent};

pub struct HeadlessCanvas {
    router: RouterHandle,
    nodes: usize,
}

impl HeadlessCanvas {
    pub fn new(router: RouterHandle) -> Self {
        Self { router, nodes: 0 }
    }

    /// Number of plugin nodes currently drawn
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn handle(&mut self, event: &UiEvent) {
        match event {
            UiEvent::PluginAdded { instance, uri, .. } => {
                info!("Plugin {} ({}) added", instance, uri);
                self.nodes += 1;
                self.router
                    .node_created(BindingKey::instance(instance.clone()));
            }
            UiEvent::PluginRemoved { instance } => {
                info!("Plugin {} removed", instance);
                self.nodes = self.nodes.saturating_sub(1);
            }
            UiEvent::PedalboardCleared => {
                info!("Pedalboard cleared");
                self.nodes = 0;
            }
            UiEvent::Connected { source, target } => info!("{} -> {}", source, target),
            UiEvent::Disconnected { source, target } => info!("{} -/- {}", source, target),
            UiEvent::SocketConnection { connected } => {
                info!("Device {}", if *connected { "connected" } else { "disconnected" })
            }
            UiEvent::Notification(notification) => match notification.level {
                NotificationLevel::Info => info!("{}", notification.message),
                NotificationLevel::Warning => warn!("{}", notification.message),
                NotificationLevel::Error => error!("{}", notification.message),
            },
            other => match serde_json::to_string(other) {
                Ok(json) => debug!("{}", json),
                Err(_) => debug!("{:?}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{RouterEvent, router_channel};
    use pedalboard_core::types::{PluginMetadata, Position};

    #[test]
    fn test_plugin_added_reports_node() {
        let (handle, mut rx) = router_channel();
        let mut canvas = HeadlessCanvas::new(handle);
        canvas.handle(&UiEvent::PluginAdded {
            instance: "/graph/eq".to_string(),
            uri: "urn:eq".to_string(),
            position: Position::default(),
            bypassed: false,
            ports: Vec::new(),
            metadata: PluginMetadata::default(),
        });
        assert_eq!(canvas.nodes(), 1);
        match rx.try_recv() {
            Ok(RouterEvent::NodeCreated(key)) => {
                assert_eq!(key, BindingKey::instance("/graph/eq"))
            }
            other => panic!("Expected NodeCreated, got {:?}", other),
        }

        canvas.handle(&UiEvent::PedalboardCleared);
        assert_eq!(canvas.nodes(), 0);
    }
}
