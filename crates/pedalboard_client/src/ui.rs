//! Events sent to the canvas collaborator.

use pedalboard_core::groups::ArrangedPort;
use pedalboard_core::mappings::{Actuator, CvMapping, HardwareDevice, HardwareMapping, MidiMapping};
use pedalboard_core::protocol::{HardwarePort, PatchValue, RescanReport, TransportState};
use pedalboard_core::types::{PluginMetadata, Position};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing message. Blocking notifications need acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub blocking: bool,
}

impl Notification {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
            blocking: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            blocking: false,
        }
    }

    pub fn blocking_error(message: impl Into<String>) -> Self {
        Self {
            blocking: true,
            ..Self::error(message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    /// The websocket to the device came up or went down
    SocketConnection { connected: bool },
    Notification(Notification),

    // Graph
    PluginLoading {
        instance: String,
        uri: String,
        position: Position,
    },
    PluginAdded {
        instance: String,
        uri: String,
        position: Position,
        bypassed: bool,
        ports: Vec<ArrangedPort>,
        metadata: PluginMetadata,
    },
    /// The instance node exists and its loading spinner can stop
    PluginReady { instance: String },
    PluginRemoved { instance: String },
    PluginMoved { instance: String, position: Position },
    PedalboardCleared,
    PedalboardModified,
    Connected { source: String, target: String },
    Disconnected { source: String, target: String },
    /// Recolour a port after its connection count changed
    PortState { port: String, connected: bool },
    HardwarePortAdded(HardwarePort),
    CvPortAdded {
        port: String,
        name: String,
        operational_mode: String,
    },
    HardwarePortRemoved { port: String },

    // Values
    ParameterChanged {
        instance: String,
        symbol: String,
        value: f64,
    },
    OutputChanged {
        instance: String,
        symbol: String,
        value: f64,
    },
    PatchChanged {
        instance: String,
        uri: String,
        writable: bool,
        value: PatchValue,
    },
    PresetChanged {
        instance: String,
        uri: Option<String>,
    },
    Transport(TransportState),
    SnapshotChanged { index: i32, name: String },
    SnapshotName { id: i32, name: String },
    TrueBypass { left: bool, right: bool },
    BufferSize { frames: u32 },

    // Telemetry
    CpuLoad { percent: f64 },
    Xruns { count: u64 },
    XrunAlert { active: bool },
    MemoryLoad { percent: f64 },
    CpuFrequency { hertz: f64 },
    Temperature { celsius: f64 },

    // Mappings and devices
    HardwareMapped(HardwareMapping),
    HardwareUnmapped { instance: String, symbol: String },
    CvMapped(CvMapping),
    CvUnmapped { instance: String, symbol: String },
    MidiMapped(MidiMapping),
    MidiUnmapped { instance: String, symbol: String },
    ActuatorAdded(Actuator),
    ActuatorRemoved { uri: String },
    DeviceAdded(HardwareDevice),
    DeviceRemoved { uri: String },
    DeviceConnectionChanged { label: String, connected: bool },
    ControlChainUpdated,

    // Lifecycle
    LoadingStarted { empty: bool, modified: bool },
    LoadingFinished,
    /// Re-fit the canvas layout to its contents
    Adapt,
    RescanCompleted(RescanReport),
    LoadRemotePedalboard { id: String },
    Stopped,
}
