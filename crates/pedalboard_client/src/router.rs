//! Message router: applies device commands to the client-side mirror.
//!
//! The router is a single task draining a [`RouterEvent`] channel. Frames
//! from the socket, results of spawned lookups and timer expiries all come
//! through that channel, so mirror state is only ever touched from one place
//! and needs no locking. Work that has to wait (metadata fetches, debounce
//! windows) is spawned and posts its outcome back as another event.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use pedalboard_core::binder::{BindingKey, PendingBindings, Watch};
use pedalboard_core::connections::ConnectionIndex;
use pedalboard_core::groups::{ArrangedPort, arrange_control_ports};
use pedalboard_core::mappings::{HardwareDevice, MappingRegistry};
use pedalboard_core::protocol::{
    AddPlugin, Command, HardwarePort, PatchValue, ProtocolError, RemoveTarget, TransportState,
};
use pedalboard_core::types::{PluginMetadata, Position, port_belongs_to, port_id};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::api::DeviceApi;
use crate::ui::{Notification, UiEvent};

/// Symbol the device uses to report an instance's bypass state
const BYPASS_SYMBOL: &str = ":bypass";

#[derive(Debug)]
pub enum RouterEvent {
    /// A text frame from the device
    Frame(String),
    MetadataResolved {
        instance: String,
        token: u64,
        result: anyhow::Result<PluginMetadata>,
    },
    /// The canvas materialized a node
    NodeCreated(BindingKey),
    SnapshotName {
        id: i32,
        result: anyhow::Result<String>,
    },
    DataReadyFlush { generation: u64 },
    XrunAlertExpired { generation: u64 },
    ConnectionChanged(bool),
    Shutdown,
}

/// Cloneable sender side of the router's event channel.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterEvent>,
}

impl RouterHandle {
    /// Returns false once the router has stopped.
    pub fn send(&self, event: RouterEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn frame(&self, frame: impl Into<String>) -> bool {
        self.send(RouterEvent::Frame(frame.into()))
    }

    pub fn node_created(&self, key: BindingKey) -> bool {
        self.send(RouterEvent::NodeCreated(key))
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(RouterEvent::Shutdown);
    }
}

pub fn router_channel() -> (RouterHandle, mpsc::UnboundedReceiver<RouterEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RouterHandle { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub data_ready_debounce: Duration,
    pub xrun_alert_window: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            data_ready_debounce: Duration::from_millis(50),
            xrun_alert_window: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Registered, metadata still being fetched
    Placeholder,
    /// Metadata known, canvas node not created yet
    AwaitingNode,
    Ready,
}

/// Mirror of one plugin instance on the pedalboard.
#[derive(Debug, Clone)]
pub struct Instance {
    pub uri: String,
    pub position: Position,
    pub bypassed: bool,
    pub version: String,
    pub official: bool,
    pub state: InstanceState,
    pub parameters: BTreeMap<String, f64>,
    pub patches: BTreeMap<String, PatchValue>,
    pub preset: Option<String>,
    pub metadata: Option<PluginMetadata>,
    pub ports: Vec<ArrangedPort>,
    /// Registration token; results for an older registration are stale
    token: u64,
}

/// Work parked until a canvas node exists.
#[derive(Debug, Clone, PartialEq)]
enum Deferred {
    Connect { source: String, target: String },
    Finalize { instance: String, token: u64 },
}

impl Deferred {
    fn touches_instance(&self, instance: &str) -> bool {
        match self {
            Deferred::Connect { source, target } => {
                port_belongs_to(source, instance) || port_belongs_to(target, instance)
            }
            Deferred::Finalize { instance: id, .. } => id == instance,
        }
    }
}

#[derive(Debug, Default)]
struct Telemetry {
    cpu_load: Option<f64>,
    xruns: Option<u64>,
    memory: Option<f64>,
    frequency: Option<f64>,
    temperature: Option<f64>,
    xrun_alert: bool,
    xrun_generation: u64,
}

#[derive(Debug, Default)]
struct DataReady {
    latest: Option<u64>,
    generation: u64,
}

pub struct Router<A: DeviceApi> {
    api: Arc<A>,
    handle: RouterHandle,
    ui: mpsc::UnboundedSender<UiEvent>,
    device: mpsc::UnboundedSender<String>,
    config: RouterConfig,

    instances: HashMap<String, Instance>,
    connections: ConnectionIndex,
    bindings: PendingBindings<Deferred>,
    mappings: MappingRegistry,
    hardware_ports: BTreeMap<String, HardwarePort>,
    cv_ports: BTreeMap<String, String>,
    transport: Option<TransportState>,

    loading: bool,
    modified: bool,
    connected: bool,
    next_token: u64,
    telemetry: Telemetry,
    data_ready: DataReady,
}

impl<A: DeviceApi> Router<A> {
    pub fn new(
        api: Arc<A>,
        handle: RouterHandle,
        ui: mpsc::UnboundedSender<UiEvent>,
        device: mpsc::UnboundedSender<String>,
        config: RouterConfig,
    ) -> Self {
        Self {
            api,
            handle,
            ui,
            device,
            config,
            instances: HashMap::new(),
            connections: ConnectionIndex::new(),
            bindings: PendingBindings::new(),
            mappings: MappingRegistry::new(),
            hardware_ports: BTreeMap::new(),
            cv_ports: BTreeMap::new(),
            transport: None,
            loading: false,
            modified: false,
            connected: false,
            next_token: 0,
            telemetry: Telemetry::default(),
            data_ready: DataReady::default(),
        }
    }

    /// Drain events until shutdown or until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<RouterEvent>) {
        info!("Router started");
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!("Router stopped");
    }

    /// Apply one event. Returns false on shutdown.
    pub fn handle_event(&mut self, event: RouterEvent) -> bool {
        match event {
            RouterEvent::Frame(frame) => self.handle_frame(&frame),
            RouterEvent::MetadataResolved {
                instance,
                token,
                result,
            } => self.metadata_resolved(instance, token, result),
            RouterEvent::NodeCreated(key) => self.node_created(key),
            RouterEvent::SnapshotName { id, result } => match result {
                Ok(name) => self.emit(UiEvent::SnapshotName { id, name }),
                Err(e) => {
                    warn!("Failed to fetch snapshot name {}: {:#}", id, e);
                    self.notify(Notification::error(format!(
                        "Failed to fetch snapshot name: {}",
                        e
                    )));
                }
            },
            RouterEvent::DataReadyFlush { generation } => self.flush_data_ready(generation),
            RouterEvent::XrunAlertExpired { generation } => {
                if generation == self.telemetry.xrun_generation && self.telemetry.xrun_alert {
                    self.telemetry.xrun_alert = false;
                    self.emit(UiEvent::XrunAlert { active: false });
                }
            }
            RouterEvent::ConnectionChanged(connected) => {
                if connected != self.connected {
                    self.connected = connected;
                    self.emit(UiEvent::SocketConnection { connected });
                }
            }
            RouterEvent::Shutdown => return false,
        }
        true
    }

    pub fn handle_frame(&mut self, frame: &str) {
        match Command::parse(frame) {
            Ok(command) => {
                trace!("<- {}", frame);
                self.apply(command);
            }
            Err(ProtocolError::UnknownCommand(name)) => {
                trace!("Ignoring unknown command '{}'", name)
            }
            Err(e) => warn!("Dropping frame '{}': {}", frame, e),
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Ping => self.reply("pong".to_string()),
            Command::Stop => self.emit(UiEvent::Stopped),
            Command::ControlChainUpdated => self.emit(UiEvent::ControlChainUpdated),
            Command::DataReady { counter } => self.data_ready(counter),

            Command::ParamSet {
                instance,
                symbol,
                value,
            } => {
                if let Some(entry) = self.instances.get_mut(&instance) {
                    if symbol == BYPASS_SYMBOL {
                        entry.bypassed = value > 0.5;
                    }
                    entry.parameters.insert(symbol.clone(), value);
                }
                self.emit(UiEvent::ParameterChanged {
                    instance,
                    symbol,
                    value,
                });
            }
            Command::OutputSet {
                instance,
                symbol,
                value,
            } => self.emit(UiEvent::OutputChanged {
                instance,
                symbol,
                value,
            }),
            Command::PatchSet {
                instance,
                writable,
                uri,
                value,
            } => {
                if let Some(entry) = self.instances.get_mut(&instance) {
                    entry.patches.insert(uri.clone(), value.clone());
                }
                self.emit(UiEvent::PatchChanged {
                    instance,
                    uri,
                    writable,
                    value,
                });
            }
            Command::PluginPos { instance, position } => {
                if let Some(entry) = self.instances.get_mut(&instance) {
                    entry.position = position;
                }
                self.emit(UiEvent::PluginMoved { instance, position });
                self.mark_modified();
            }
            Command::Transport(state) => {
                self.transport = Some(state.clone());
                self.emit(UiEvent::Transport(state));
            }
            Command::Preset { instance, uri } => {
                if let Some(entry) = self.instances.get_mut(&instance) {
                    entry.preset = uri.clone();
                }
                self.emit(UiEvent::PresetChanged { instance, uri });
            }
            Command::PedalSnapshot { index, name } => {
                self.emit(UiEvent::SnapshotChanged { index, name })
            }

            Command::Stats { cpu_load, xruns } => self.stats(cpu_load, xruns),
            Command::SysStats {
                memory,
                frequency,
                temperature,
            } => self.sys_stats(memory, frequency, temperature),

            Command::HwMap(mapping) => {
                self.mappings.map_hardware(mapping.clone());
                self.emit(UiEvent::HardwareMapped(mapping));
            }
            Command::HwUnmap { instance, symbol } => {
                if self.mappings.unmap_hardware(&instance, &symbol).is_some() {
                    self.emit(UiEvent::HardwareUnmapped { instance, symbol });
                }
            }
            Command::CvMap(mapping) => {
                self.mappings.map_cv(mapping.clone());
                self.emit(UiEvent::CvMapped(mapping));
            }
            Command::CvUnmap { instance, symbol } => {
                if self.mappings.unmap_cv(&instance, &symbol).is_some() {
                    self.emit(UiEvent::CvUnmapped { instance, symbol });
                }
            }
            Command::MidiMap(mapping) => match self.mappings.map_midi(mapping.clone()) {
                Ok(_) => self.emit(UiEvent::MidiMapped(mapping)),
                Err(e) => warn!(
                    "Rejected MIDI mapping for {}/{}: {}",
                    mapping.instance, mapping.symbol, e
                ),
            },
            Command::MidiUnmap { instance, symbol } => {
                if self.mappings.unmap_midi(&instance, &symbol).is_some() {
                    self.emit(UiEvent::MidiUnmapped { instance, symbol });
                }
            }
            Command::ActuatorAdd(actuator) => {
                self.mappings.add_actuator(actuator.clone());
                self.emit(UiEvent::ActuatorAdded(actuator));
            }
            Command::ActuatorRemove { uri } => {
                if self.mappings.remove_actuator(&uri).is_some() {
                    self.emit(UiEvent::ActuatorRemoved { uri });
                }
            }
            Command::DeviceAdded {
                uri,
                label,
                label_suffix,
                version,
            } => {
                let device = HardwareDevice {
                    uri,
                    label,
                    label_suffix,
                    version,
                    connected: false,
                };
                self.mappings.add_device(device.clone());
                self.emit(UiEvent::DeviceAdded(device));
            }
            Command::DeviceRemoved { uri, .. } => {
                if self.mappings.remove_device(&uri).is_some() {
                    self.emit(UiEvent::DeviceRemoved { uri });
                }
            }
            Command::DeviceConnected { label, .. } => self.device_connection(label, true),
            Command::DeviceDisconnected { label, .. } => self.device_connection(label, false),

            Command::Connect { source, target } => self.connect(source, target),
            Command::Disconnect { source, target } => self.disconnect(source, target),
            Command::Add(add) => self.add(add),
            Command::Remove(RemoveTarget::All) => self.remove_all(),
            Command::Remove(RemoveTarget::Instance(instance)) => self.remove(&instance),
            Command::AddHwPort(port) => {
                let key = BindingKey::port(port.port.clone());
                self.hardware_ports.insert(port.port.clone(), port.clone());
                self.emit(UiEvent::HardwarePortAdded(port));
                self.created(&key);
            }
            Command::AddCvPort {
                port,
                name,
                operational_mode,
            } => {
                let key = BindingKey::port(port.clone());
                self.cv_ports.insert(port.clone(), name.clone());
                self.emit(UiEvent::CvPortAdded {
                    port,
                    name,
                    operational_mode,
                });
                self.created(&key);
            }
            Command::RemoveHwPort { port } => self.remove_port(port),

            Command::LoadingStart { empty, modified } => {
                self.loading = true;
                self.modified = modified;
                self.emit(UiEvent::LoadingStarted { empty, modified });
            }
            Command::LoadingEnd { snapshot_id } => self.loading_end(snapshot_id),
            Command::Size { width, height } => trace!("Ignoring size {}x{}", width, height),
            Command::TrueBypass { left, right } => self.emit(UiEvent::TrueBypass { left, right }),
            Command::Log { level, message } => match level {
                0 => debug!(target: "device", "{}", message),
                1 => info!(target: "device", "{}", message),
                2 => warn!(target: "device", "{}", message),
                _ => error!(target: "device", "{}", message),
            },
            Command::Rescan(report) => self.emit(UiEvent::RescanCompleted(report)),
            Command::LoadRemotePedalboard { id } => {
                self.emit(UiEvent::LoadRemotePedalboard { id })
            }
            Command::BufferSize { frames } => self.emit(UiEvent::BufferSize { frames }),
        }
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            trace!("UI receiver dropped");
        }
    }

    fn notify(&self, notification: Notification) {
        self.emit(UiEvent::Notification(notification));
    }

    fn reply(&self, message: String) {
        trace!("-> {}", message);
        if self.device.send(message).is_err() {
            debug!("Socket gone, reply dropped");
        }
    }

    /// Flag a user-visible change, unless a pedalboard is being loaded.
    fn mark_modified(&mut self) {
        if self.loading || self.modified {
            return;
        }
        self.modified = true;
        self.emit(UiEvent::PedalboardModified);
    }

    fn data_ready(&mut self, counter: u64) {
        self.data_ready.latest = Some(counter);
        self.data_ready.generation += 1;
        let generation = self.data_ready.generation;
        let handle = self.handle.clone();
        let window = self.config.data_ready_debounce;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            handle.send(RouterEvent::DataReadyFlush { generation });
        });
    }

    fn flush_data_ready(&mut self, generation: u64) {
        if generation != self.data_ready.generation {
            return;
        }
        if let Some(counter) = self.data_ready.latest.take() {
            self.reply(format!("data_ready {}", counter));
        }
    }

    fn stats(&mut self, cpu_load: f64, xruns: u64) {
        if self.telemetry.cpu_load != Some(cpu_load) {
            self.telemetry.cpu_load = Some(cpu_load);
            self.emit(UiEvent::CpuLoad { percent: cpu_load });
        }

        let previous = self.telemetry.xruns.replace(xruns);
        if previous == Some(xruns) {
            return;
        }
        self.emit(UiEvent::Xruns { count: xruns });
        if previous.is_some_and(|previous| xruns > previous) {
            self.start_xrun_alert();
        }
    }

    /// Open the xrun alert window, or extend it if already open.
    fn start_xrun_alert(&mut self) {
        self.telemetry.xrun_generation += 1;
        if !self.telemetry.xrun_alert {
            self.telemetry.xrun_alert = true;
            self.emit(UiEvent::XrunAlert { active: true });
        }
        let generation = self.telemetry.xrun_generation;
        let handle = self.handle.clone();
        let window = self.config.xrun_alert_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            handle.send(RouterEvent::XrunAlertExpired { generation });
        });
    }

    fn sys_stats(&mut self, memory: f64, frequency: f64, temperature: f64) {
        if self.telemetry.memory != Some(memory) {
            self.telemetry.memory = Some(memory);
            self.emit(UiEvent::MemoryLoad { percent: memory });
        }
        if self.telemetry.frequency != Some(frequency) {
            self.telemetry.frequency = Some(frequency);
            self.emit(UiEvent::CpuFrequency { hertz: frequency });
        }
        if self.telemetry.temperature != Some(temperature) {
            self.telemetry.temperature = Some(temperature);
            self.emit(UiEvent::Temperature {
                celsius: temperature,
            });
        }
    }

    fn device_connection(&mut self, label: String, connected: bool) {
        if self.mappings.set_device_connected(&label, connected) == 0 {
            debug!("No device labelled '{}'", label);
        }
        self.emit(UiEvent::DeviceConnectionChanged { label, connected });
    }

    fn connect(&mut self, source: String, target: String) {
        if self.connections.contains(&source, &target) {
            trace!("{} -> {} already connected", source, target);
            return;
        }

        let missing = [&source, &target]
            .into_iter()
            .find(|port| !self.bindings.is_present(&BindingKey::port(port.as_str())))
            .cloned();
        if let Some(port) = missing {
            let key = BindingKey::port(port);
            debug!("Deferring {} -> {} until {} exists", source, target, key);
            let action = Deferred::Connect { source, target };
            if let Watch::Ready(action) = self.bindings.watch(key, action) {
                self.run_deferred(action);
            }
            return;
        }

        self.connections.insert(&source, &target);
        self.emit(UiEvent::PortState {
            port: source.clone(),
            connected: true,
        });
        self.emit(UiEvent::Connected { source, target });
        self.mark_modified();
    }

    fn disconnect(&mut self, source: String, target: String) {
        let cancelled = self.bindings.unwatch_where(|action| match action {
            Deferred::Connect { source: s, target: t } => *s == source && *t == target,
            Deferred::Finalize { .. } => false,
        });
        if !cancelled.is_empty() {
            debug!("Cancelled pending connect {} -> {}", source, target);
            return;
        }

        if !self.connections.remove(&source, &target) {
            debug!("{} -> {} is not connected", source, target);
            return;
        }
        self.emit(UiEvent::Disconnected {
            source: source.clone(),
            target,
        });
        if !self.connections.has_connections_from(&source) {
            self.emit(UiEvent::PortState {
                port: source,
                connected: false,
            });
        }
        self.mark_modified();
    }

    fn add(&mut self, add: AddPlugin) {
        if self.instances.contains_key(&add.instance) {
            debug!("Instance {} already registered", add.instance);
            return;
        }

        let token = self.next_token;
        self.next_token += 1;
        self.instances.insert(
            add.instance.clone(),
            Instance {
                uri: add.uri.clone(),
                position: add.position,
                bypassed: add.bypassed,
                version: add.version.clone(),
                official: add.official,
                state: InstanceState::Placeholder,
                parameters: BTreeMap::new(),
                patches: BTreeMap::new(),
                preset: None,
                metadata: None,
                ports: Vec::new(),
                token,
            },
        );
        self.emit(UiEvent::PluginLoading {
            instance: add.instance.clone(),
            uri: add.uri.clone(),
            position: add.position,
        });
        self.mark_modified();

        let api = self.api.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let result = api.plugin_metadata(&add.uri, &add.version).await;
            handle.send(RouterEvent::MetadataResolved {
                instance: add.instance,
                token,
                result,
            });
        });
    }

    fn metadata_resolved(
        &mut self,
        instance: String,
        token: u64,
        result: anyhow::Result<PluginMetadata>,
    ) {
        let Some(entry) = self
            .instances
            .get_mut(&instance)
            .filter(|entry| entry.token == token)
        else {
            debug!("Discarding stale metadata for {}", instance);
            return;
        };

        match result {
            Ok(metadata) => {
                let ports = arrange_control_ports(&metadata);
                entry.state = InstanceState::AwaitingNode;
                entry.ports = ports.clone();
                entry.metadata = Some(metadata.clone());
                let event = UiEvent::PluginAdded {
                    instance: instance.clone(),
                    uri: entry.uri.clone(),
                    position: entry.position,
                    bypassed: entry.bypassed,
                    ports,
                    metadata,
                };
                self.emit(event);

                let key = BindingKey::instance(instance.clone());
                if let Watch::Ready(action) =
                    self.bindings.watch(key, Deferred::Finalize { instance, token })
                {
                    self.run_deferred(action);
                }
            }
            Err(e) => {
                let uri = entry.uri.clone();
                warn!("Failed to load {} ({}): {:#}", instance, uri, e);
                self.instances.remove(&instance);
                self.bindings
                    .unwatch_where(|action| action.touches_instance(&instance));
                self.emit(UiEvent::PluginRemoved { instance });
                self.notify(Notification::error(format!(
                    "Failed to load plugin {}: {}",
                    uri, e
                )));
            }
        }
    }

    fn node_created(&mut self, key: BindingKey) {
        if let BindingKey::Instance(instance) = &key {
            let Some(entry) = self.instances.get(instance) else {
                debug!("Node created for unknown instance {}", instance);
                return;
            };
            let ports: Vec<BindingKey> = entry
                .metadata
                .iter()
                .flat_map(|metadata| metadata.connectable_symbols())
                .map(|symbol| BindingKey::port(port_id(instance, symbol)))
                .collect();
            for port in &ports {
                self.created(port);
            }
        }
        self.created(&key);
    }

    /// Record a node as present and run what waited for it.
    fn created(&mut self, key: &BindingKey) {
        for action in self.bindings.mark_created(key) {
            self.run_deferred(action);
        }
    }

    fn run_deferred(&mut self, action: Deferred) {
        match action {
            Deferred::Connect { source, target } => self.connect(source, target),
            Deferred::Finalize { instance, token } => {
                let Some(entry) = self
                    .instances
                    .get_mut(&instance)
                    .filter(|entry| entry.token == token)
                else {
                    return;
                };
                entry.state = InstanceState::Ready;
                self.emit(UiEvent::PluginReady { instance });
            }
        }
    }

    fn remove_all(&mut self) {
        self.instances.clear();
        self.connections.clear();
        self.bindings.clear_pending();
        let hardware_ports = &self.hardware_ports;
        let cv_ports = &self.cv_ports;
        self.bindings.mark_removed_where(|key| match key {
            BindingKey::Instance(_) => true,
            BindingKey::Port(port) => {
                !hardware_ports.contains_key(port) && !cv_ports.contains_key(port)
            }
        });
        self.mappings.clear_mappings();
        self.emit(UiEvent::PedalboardCleared);
        self.mark_modified();
    }

    fn remove(&mut self, instance: &str) {
        // Connects may wait on an instance that was never added.
        self.bindings
            .unwatch_where(|action| action.touches_instance(instance));
        if self.instances.remove(instance).is_none() {
            debug!("Remove of unknown instance {}", instance);
            return;
        }

        self.bindings.mark_removed_where(|key| match key {
            BindingKey::Instance(id) => id == instance,
            BindingKey::Port(port) => port_belongs_to(port, instance),
        });
        self.mappings.remove_instance(instance);

        let removed = self.connections.remove_instance(instance);
        self.emit_removed_connections(removed, |port| port_belongs_to(port, instance));
        self.emit(UiEvent::PluginRemoved {
            instance: instance.to_string(),
        });
        self.mark_modified();
    }

    fn remove_port(&mut self, port: String) {
        self.hardware_ports.remove(&port);
        self.cv_ports.remove(&port);
        self.bindings.unwatch_where(|action| match action {
            Deferred::Connect { source, target } => *source == port || *target == port,
            Deferred::Finalize { .. } => false,
        });
        self.bindings.mark_removed(&BindingKey::port(port.clone()));
        for mapping in self.mappings.remove_cv_source(&port) {
            self.emit(UiEvent::CvUnmapped {
                instance: mapping.instance,
                symbol: mapping.symbol,
            });
        }

        let removed = self.connections.remove_port(&port);
        self.emit_removed_connections(removed, |source| source == port);
        self.emit(UiEvent::HardwarePortRemoved { port });
    }

    /// Report removed connections and recolour sources left unconnected.
    /// Sources matching `gone` no longer exist and are not recoloured.
    fn emit_removed_connections(
        &mut self,
        removed: Vec<(String, String)>,
        gone: impl Fn(&str) -> bool,
    ) {
        let mut orphaned = Vec::new();
        for (source, target) in removed {
            if !gone(&source)
                && !self.connections.has_connections_from(&source)
                && !orphaned.contains(&source)
            {
                orphaned.push(source.clone());
            }
            self.emit(UiEvent::Disconnected { source, target });
        }
        for port in orphaned {
            self.emit(UiEvent::PortState {
                port,
                connected: false,
            });
        }
    }

    fn loading_end(&mut self, snapshot_id: i32) {
        self.loading = false;
        self.emit(UiEvent::LoadingFinished);
        self.emit(UiEvent::Adapt);

        if snapshot_id < 0 {
            return;
        }
        let api = self.api.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let result = api.snapshot_name(snapshot_id).await;
            handle.send(RouterEvent::SnapshotName {
                id: snapshot_id,
                result,
            });
        });
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.get(id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn connections(&self) -> &ConnectionIndex {
        &self.connections
    }

    pub fn pending_bindings(&self) -> usize {
        self.bindings.pending_len()
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn hardware_ports(&self) -> impl Iterator<Item = &HardwarePort> {
        self.hardware_ports.values()
    }

    pub fn transport(&self) -> Option<&TransportState> {
        self.transport.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}
