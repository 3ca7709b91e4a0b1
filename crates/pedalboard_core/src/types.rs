use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-part plugin version as published by plugin bundles.
///
/// Ordering compares all four components, builder first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginVersion {
    pub builder: u32,
    pub minor: u32,
    pub micro: u32,
    pub release: u32,
}

impl PluginVersion {
    pub fn new(builder: u32, minor: u32, micro: u32, release: u32) -> Self {
        Self {
            builder,
            minor,
            micro,
            release,
        }
    }

    /// Cache-busting token used in image URLs, e.g. `2_1_4_0`.
    pub fn cache_token(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.builder, self.minor, self.micro, self.release
        )
    }

    fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.builder, self.minor, self.micro, self.release)
    }
}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_tuple().cmp(&other.as_tuple())
    }
}

/// Display form is `minor.micro-release`; the builder component is internal.
impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}-{}", self.minor, self.micro, self.release)
    }
}

/// Canvas position of a plugin instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Value range of a control port
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRanges {
    pub minimum: f64,
    pub maximum: f64,
    pub default: f64,
}

/// Audio, MIDI or CV port of a plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortInfo {
    pub index: u32,
    pub symbol: String,
    pub name: String,
}

/// Control port of a plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPort {
    pub index: u32,
    pub symbol: String,
    pub name: String,
    /// URI of the port group this port belongs to, if any
    pub group: Option<String>,
    pub ranges: PortRanges,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDirections<T> {
    #[serde(default = "Vec::new")]
    pub input: Vec<T>,
    #[serde(default = "Vec::new")]
    pub output: Vec<T>,
}

impl<T> Default for PortDirections<T> {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            output: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginPorts {
    pub audio: PortDirections<PortInfo>,
    pub control: PortDirections<ControlPort>,
    pub midi: PortDirections<PortInfo>,
    pub cv: PortDirections<PortInfo>,
}

/// Port group definition (e.g. a stereo pair or an EQ band)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortGroup {
    pub uri: String,
    pub symbol: String,
    pub name: String,
}

/// Full plugin description returned by the device's `/effect/get` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginMetadata {
    pub uri: String,
    pub name: String,
    pub builder: u32,
    pub minor_version: u32,
    pub micro_version: u32,
    pub release: u32,
    pub ports: PluginPorts,
    pub port_groups: Vec<PortGroup>,
}

impl PluginMetadata {
    pub fn version(&self) -> PluginVersion {
        PluginVersion::new(
            self.builder,
            self.minor_version,
            self.micro_version,
            self.release,
        )
    }

    /// Symbols of every connectable port (audio, MIDI and CV, both directions).
    pub fn connectable_symbols(&self) -> impl Iterator<Item = &str> {
        let ports = &self.ports;
        [&ports.audio, &ports.midi, &ports.cv]
            .into_iter()
            .flat_map(|dirs| dirs.input.iter().chain(dirs.output.iter()))
            .map(|port| port.symbol.as_str())
    }
}

/// Full port id for `symbol` on `instance`.
pub fn port_id(instance: &str, symbol: &str) -> String {
    format!("{}/{}", instance, symbol)
}

/// Instance part of a port id (`"/graph/eq/in"` -> `"/graph/eq"`).
pub fn port_instance(port: &str) -> &str {
    port.rsplit_once('/').map(|(instance, _)| instance).unwrap_or("")
}

/// Whether `port` belongs to `instance`.
pub fn port_belongs_to(port: &str, instance: &str) -> bool {
    !instance.is_empty() && port_instance(port) == instance
}
