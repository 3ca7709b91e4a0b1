//! Text protocol spoken by the device over the websocket.
//!
//! A frame is `"<command>[ <args...>]"`: the command is everything up to the
//! first space, arguments are space-delimited. A few commands end in a
//! free-text field which keeps its spaces.
//!
//! Parsing is strict: a missing argument or a malformed/non-finite number
//! rejects the whole frame with a [`ProtocolError`] instead of letting a
//! half-parsed value through.

use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mappings::{Actuator, CvMapping, HardwareMapping, MidiMapping};
use crate::types::Position;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("{command}: missing field '{field}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
    #[error("{command}: invalid {field} '{value}'")]
    InvalidField {
        command: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{command}: invalid payload: {message}")]
    InvalidPayload {
        command: &'static str,
        message: String,
    },
}

/// Transport state broadcast by the device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportState {
    pub rolling: bool,
    pub beats_per_bar: f64,
    pub beats_per_minute: f64,
    pub sync_mode: String,
}

/// Typed value of a plugin patch property (`patch_set`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum PatchValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Path(String),
    Uri(String),
    /// Value types the client does not interpret
    Raw { value_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddPlugin {
    pub instance: String,
    pub uri: String,
    pub position: Position,
    pub bypassed: bool,
    pub version: String,
    pub official: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RemoveTarget {
    /// `remove :all` clears the whole pedalboard
    All,
    Instance(String),
}

/// Sentinel instance id of `remove :all`
pub const REMOVE_ALL: &str = ":all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortKind {
    Audio,
    Midi,
    Cv,
}

impl FromStr for PortKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(PortKind::Audio),
            "midi" => Ok(PortKind::Midi),
            "cv" => Ok(PortKind::Cv),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwarePort {
    pub port: String,
    pub kind: PortKind,
    pub is_output: bool,
    pub name: String,
    pub index: u32,
}

/// Result of a plugin rescan on the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescanReport {
    pub installed: Vec<String>,
    pub removed: Vec<String>,
}

/// A decoded device command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Stop,
    ControlChainUpdated,
    DataReady { counter: u64 },
    ParamSet { instance: String, symbol: String, value: f64 },
    OutputSet { instance: String, symbol: String, value: f64 },
    PatchSet { instance: String, writable: bool, uri: String, value: PatchValue },
    Stats { cpu_load: f64, xruns: u64 },
    SysStats { memory: f64, frequency: f64, temperature: f64 },
    PluginPos { instance: String, position: Position },
    Transport(TransportState),
    Preset { instance: String, uri: Option<String> },
    PedalSnapshot { index: i32, name: String },
    HwMap(HardwareMapping),
    HwUnmap { instance: String, symbol: String },
    CvMap(CvMapping),
    CvUnmap { instance: String, symbol: String },
    MidiMap(MidiMapping),
    MidiUnmap { instance: String, symbol: String },
    Connect { source: String, target: String },
    Disconnect { source: String, target: String },
    Add(AddPlugin),
    Remove(RemoveTarget),
    AddCvPort { port: String, name: String, operational_mode: String },
    AddHwPort(HardwarePort),
    RemoveHwPort { port: String },
    ActuatorAdd(Actuator),
    ActuatorRemove { uri: String },
    DeviceAdded { uri: String, label: String, label_suffix: String, version: String },
    DeviceRemoved { uri: String, label: String, version: String },
    DeviceConnected { label: String, version: String },
    DeviceDisconnected { label: String, version: String },
    LoadingStart { empty: bool, modified: bool },
    LoadingEnd { snapshot_id: i32 },
    Size { width: i32, height: i32 },
    TrueBypass { left: bool, right: bool },
    Log { level: i32, message: String },
    Rescan(RescanReport),
    LoadRemotePedalboard { id: String },
    BufferSize { frames: u32 },
}

impl Command {
    /// Decode a single text frame.
    pub fn parse(frame: &str) -> Result<Command, ProtocolError> {
        let frame = frame.trim_end_matches(['\r', '\n']);
        let (name, rest) = frame.split_once(' ').unwrap_or((frame, ""));

        let command = match name {
            "" => return Err(ProtocolError::Empty),
            "ping" => Command::Ping,
            "stop" => Command::Stop,
            "cc-device-updated" => Command::ControlChainUpdated,
            "data_ready" => {
                let mut args = Args::new("data_ready", rest, 1);
                Command::DataReady {
                    counter: args.integer("counter")?,
                }
            }
            "param_set" | "output_set" => {
                let label = if name == "param_set" { "param_set" } else { "output_set" };
                let mut args = Args::new(label, rest, 3);
                let instance = args.text("instance")?;
                let symbol = args.text("symbol")?;
                let value = args.number("value")?;
                if name == "param_set" {
                    Command::ParamSet { instance, symbol, value }
                } else {
                    Command::OutputSet { instance, symbol, value }
                }
            }
            "patch_set" => {
                let mut args = Args::new("patch_set", rest, 5);
                let instance = args.text("instance")?;
                let writable = args.flag("writable")?;
                let uri = args.text("uri")?;
                let value_type = args.text("valuetype")?;
                let data = args.tail();
                Command::PatchSet {
                    instance,
                    writable,
                    uri,
                    value: parse_patch_value(&value_type, data)?,
                }
            }
            "stats" => {
                let mut args = Args::new("stats", rest, 2);
                Command::Stats {
                    cpu_load: args.number("cpu_load")?,
                    xruns: args.integer("xruns")?,
                }
            }
            "sys_stats" => {
                let mut args = Args::new("sys_stats", rest, 3);
                Command::SysStats {
                    memory: args.number("memory")?,
                    frequency: args.number("frequency")?,
                    temperature: args.number("temperature")?,
                }
            }
            "plugin_pos" => {
                let mut args = Args::new("plugin_pos", rest, 3);
                let instance = args.text("instance")?;
                let x = args.number("x")?;
                let y = args.number("y")?;
                Command::PluginPos {
                    instance,
                    position: Position { x, y },
                }
            }
            "transport" => {
                let mut args = Args::new("transport", rest, 4);
                Command::Transport(TransportState {
                    rolling: args.flag("rolling")?,
                    beats_per_bar: args.number("bpb")?,
                    beats_per_minute: args.number("bpm")?,
                    sync_mode: args.text("sync_mode")?,
                })
            }
            "preset" => {
                let mut args = Args::new("preset", rest, 2);
                Command::Preset {
                    instance: args.text("instance")?,
                    uri: args.optional("value")?,
                }
            }
            "pedal_snapshot" => {
                let mut args = Args::new("pedal_snapshot", rest, 2);
                Command::PedalSnapshot {
                    index: args.integer("index")?,
                    name: args.tail(),
                }
            }
            "hw_map" => Command::HwMap(parse_hw_map(rest)?),
            "cv_map" => Command::CvMap(parse_cv_map(rest)?),
            "midi_map" => {
                let mut args = Args::new("midi_map", rest, 6);
                Command::MidiMap(MidiMapping {
                    instance: args.text("instance")?,
                    symbol: args.text("symbol")?,
                    channel: args.integer("channel")?,
                    control: args.integer("control")?,
                    minimum: args.number("minimum")?,
                    maximum: args.number("maximum")?,
                })
            }
            "hw_unmap" | "cv_unmap" | "midi_unmap" => {
                let label = match name {
                    "hw_unmap" => "hw_unmap",
                    "cv_unmap" => "cv_unmap",
                    _ => "midi_unmap",
                };
                let mut args = Args::new(label, rest, 2);
                let instance = args.text("instance")?;
                let symbol = args.text("symbol")?;
                match name {
                    "hw_unmap" => Command::HwUnmap { instance, symbol },
                    "cv_unmap" => Command::CvUnmap { instance, symbol },
                    _ => Command::MidiUnmap { instance, symbol },
                }
            }
            "connect" | "disconnect" => {
                let label = if name == "connect" { "connect" } else { "disconnect" };
                let mut args = Args::new(label, rest, 2);
                let source = args.text("source")?;
                let target = args.text("target")?;
                if name == "connect" {
                    Command::Connect { source, target }
                } else {
                    Command::Disconnect { source, target }
                }
            }
            "add" => {
                let mut args = Args::new("add", rest, 7);
                let instance = args.text("instance")?;
                let uri = args.text("uri")?;
                let x = args.number("x")?;
                let y = args.number("y")?;
                let bypassed = args.flag("bypassed")?;
                let version = args.optional("version")?.unwrap_or_default();
                let official = match args.optional("official")? {
                    Some(value) => parse_flag(&value)
                        .ok_or_else(|| invalid("add", "official", &value))?,
                    None => false,
                };
                Command::Add(AddPlugin {
                    instance,
                    uri,
                    position: Position { x, y },
                    bypassed,
                    version,
                    official,
                })
            }
            "remove" => {
                let mut args = Args::new("remove", rest, 1);
                let instance = args.text("instance")?;
                Command::Remove(if instance == REMOVE_ALL {
                    RemoveTarget::All
                } else {
                    RemoveTarget::Instance(instance)
                })
            }
            "add_cv_port" => {
                let mut args = Args::new("add_cv_port", rest, 3);
                Command::AddCvPort {
                    port: args.text("port")?,
                    name: args.label("name")?,
                    operational_mode: args.text("operational_mode")?,
                }
            }
            "add_hw_port" => {
                let mut args = Args::new("add_hw_port", rest, 5);
                let port = args.text("port")?;
                let kind_text = args.text("type")?;
                let kind = kind_text
                    .parse()
                    .map_err(|_| invalid("add_hw_port", "type", &kind_text))?;
                Command::AddHwPort(HardwarePort {
                    port,
                    kind,
                    is_output: args.flag("is_output")?,
                    name: args.label("name")?,
                    index: args.integer("index")?,
                })
            }
            "remove_hw_port" => {
                let mut args = Args::new("remove_hw_port", rest, 1);
                Command::RemoveHwPort {
                    port: args.text("port")?,
                }
            }
            "act_add" => {
                let mut args = Args::new("act_add", rest, 1);
                let payload = args.text("metadata")?;
                Command::ActuatorAdd(decode_base64_json("act_add", &payload)?)
            }
            "act_del" => {
                let mut args = Args::new("act_del", rest, 1);
                Command::ActuatorRemove {
                    uri: args.text("uri")?,
                }
            }
            "hw_add" => {
                let mut args = Args::new("hw_add", rest, 4);
                Command::DeviceAdded {
                    uri: args.text("dev_uri")?,
                    label: args.label("label")?,
                    label_suffix: args.label("label_suffix")?,
                    version: args.text("version")?,
                }
            }
            "hw_rem" => {
                let mut args = Args::new("hw_rem", rest, 3);
                Command::DeviceRemoved {
                    uri: args.text("dev_uri")?,
                    label: args.label("label")?,
                    version: args.text("version")?,
                }
            }
            "hw_con" | "hw_dis" => {
                let label_name = if name == "hw_con" { "hw_con" } else { "hw_dis" };
                let mut args = Args::new(label_name, rest, 2);
                let label = args.label("label")?;
                let version = args.text("version")?;
                if name == "hw_con" {
                    Command::DeviceConnected { label, version }
                } else {
                    Command::DeviceDisconnected { label, version }
                }
            }
            "loading_start" => {
                let mut args = Args::new("loading_start", rest, 2);
                Command::LoadingStart {
                    empty: args.flag("empty")?,
                    modified: args.flag("modified")?,
                }
            }
            "loading_end" => {
                let mut args = Args::new("loading_end", rest, 1);
                Command::LoadingEnd {
                    snapshot_id: args.integer("snapshot_id")?,
                }
            }
            "size" => {
                let mut args = Args::new("size", rest, 2);
                Command::Size {
                    width: args.integer("width")?,
                    height: args.integer("height")?,
                }
            }
            "truebypass" => {
                let mut args = Args::new("truebypass", rest, 2);
                Command::TrueBypass {
                    left: args.flag("left")?,
                    right: args.flag("right")?,
                }
            }
            "log" => {
                let mut args = Args::new("log", rest, 2);
                Command::Log {
                    level: args.integer("level")?,
                    message: args.tail(),
                }
            }
            "rescan" => {
                let mut args = Args::new("rescan", rest, 1);
                let payload = args.text("payload")?;
                Command::Rescan(decode_base64_json("rescan", &payload)?)
            }
            "load-pb-remote" => {
                let mut args = Args::new("load-pb-remote", rest, 1);
                Command::LoadRemotePedalboard {
                    id: args.text("id")?,
                }
            }
            "bufsize" => {
                let mut args = Args::new("bufsize", rest, 1);
                Command::BufferSize {
                    frames: args.integer("frames")?,
                }
            }
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        Ok(command)
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Stop => "stop",
            Command::ControlChainUpdated => "cc-device-updated",
            Command::DataReady { .. } => "data_ready",
            Command::ParamSet { .. } => "param_set",
            Command::OutputSet { .. } => "output_set",
            Command::PatchSet { .. } => "patch_set",
            Command::Stats { .. } => "stats",
            Command::SysStats { .. } => "sys_stats",
            Command::PluginPos { .. } => "plugin_pos",
            Command::Transport(_) => "transport",
            Command::Preset { .. } => "preset",
            Command::PedalSnapshot { .. } => "pedal_snapshot",
            Command::HwMap(_) => "hw_map",
            Command::HwUnmap { .. } => "hw_unmap",
            Command::CvMap(_) => "cv_map",
            Command::CvUnmap { .. } => "cv_unmap",
            Command::MidiMap(_) => "midi_map",
            Command::MidiUnmap { .. } => "midi_unmap",
            Command::Connect { .. } => "connect",
            Command::Disconnect { .. } => "disconnect",
            Command::Add(_) => "add",
            Command::Remove(_) => "remove",
            Command::AddCvPort { .. } => "add_cv_port",
            Command::AddHwPort(_) => "add_hw_port",
            Command::RemoveHwPort { .. } => "remove_hw_port",
            Command::ActuatorAdd(_) => "act_add",
            Command::ActuatorRemove { .. } => "act_del",
            Command::DeviceAdded { .. } => "hw_add",
            Command::DeviceRemoved { .. } => "hw_rem",
            Command::DeviceConnected { .. } => "hw_con",
            Command::DeviceDisconnected { .. } => "hw_dis",
            Command::LoadingStart { .. } => "loading_start",
            Command::LoadingEnd { .. } => "loading_end",
            Command::Size { .. } => "size",
            Command::TrueBypass { .. } => "truebypass",
            Command::Log { .. } => "log",
            Command::Rescan(_) => "rescan",
            Command::LoadRemotePedalboard { .. } => "load-pb-remote",
            Command::BufferSize { .. } => "bufsize",
        }
    }
}

/// Positional argument reader for one frame.
struct Args<'a> {
    command: &'static str,
    fields: std::vec::IntoIter<&'a str>,
}

impl<'a> Args<'a> {
    /// Split `rest` into at most `max_fields`; the last field keeps any spaces.
    fn new(command: &'static str, rest: &'a str, max_fields: usize) -> Self {
        let fields: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.splitn(max_fields, ' ').collect()
        };
        Self {
            command,
            fields: fields.into_iter(),
        }
    }

    fn raw(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.fields.next().ok_or(ProtocolError::MissingField {
            command: self.command,
            field,
        })
    }

    fn text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        self.raw(field).map(str::to_string)
    }

    /// Labels travel with spaces encoded as underscores.
    fn label(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        self.raw(field).map(|value| value.replace('_', " "))
    }

    /// Remaining free text, empty when absent.
    fn tail(&mut self) -> String {
        self.fields.next().unwrap_or_default().to_string()
    }

    /// `None`/`null`/absent map to `None`.
    fn optional(&mut self, _field: &'static str) -> Result<Option<String>, ProtocolError> {
        Ok(self.fields.next().and_then(|value| match value {
            "" | "None" | "null" => None,
            other => Some(other.to_string()),
        }))
    }

    fn optional_integer<T: FromStr>(
        &mut self,
        field: &'static str,
    ) -> Result<Option<T>, ProtocolError> {
        match self.optional(field)? {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| invalid(self.command, field, &value)),
            None => Ok(None),
        }
    }

    fn number(&mut self, field: &'static str) -> Result<f64, ProtocolError> {
        let value = self.raw(field)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid(self.command, field, value))
    }

    fn integer<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let value = self.raw(field)?;
        value
            .parse::<T>()
            .map_err(|_| invalid(self.command, field, value))
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        let value = self.raw(field)?;
        parse_flag(value).ok_or_else(|| invalid(self.command, field, value))
    }

    /// Python-style literal: `None` or a JSON value with single quotes.
    fn json_literal(
        &mut self,
        field: &'static str,
    ) -> Result<Option<serde_json::Value>, ProtocolError> {
        match self.optional(field)? {
            Some(value) => serde_json::from_str(&value.replace('\'', "\""))
                .map(Some)
                .map_err(|_| invalid(self.command, field, &value)),
            None => Ok(None),
        }
    }
}

fn invalid(command: &'static str, field: &'static str, value: &str) -> ProtocolError {
    ProtocolError::InvalidField {
        command,
        field,
        value: value.to_string(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_patch_value(value_type: &str, data: String) -> Result<PatchValue, ProtocolError> {
    let bad = |data: &str| invalid("patch_set", "valuedata", data);
    Ok(match value_type {
        "b" => PatchValue::Bool(parse_flag(&data).ok_or_else(|| bad(&data))?),
        "i" | "l" => PatchValue::Int(data.parse().map_err(|_| bad(&data))?),
        "f" | "g" => PatchValue::Float(
            data.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| bad(&data))?,
        ),
        "s" => PatchValue::String(data),
        "p" => PatchValue::Path(data),
        "u" => PatchValue::Uri(data),
        other => PatchValue::Raw {
            value_type: other.to_string(),
            data,
        },
    })
}

fn parse_hw_map(rest: &str) -> Result<HardwareMapping, ProtocolError> {
    let mut args = Args::new("hw_map", rest, 15);
    Ok(HardwareMapping {
        instance: args.text("instance")?,
        symbol: args.text("symbol")?,
        actuator: args.text("actuator")?,
        minimum: args.number("minimum")?,
        maximum: args.number("maximum")?,
        steps: args.integer("steps")?,
        label: args.label("label")?,
        tempo: args.flag("tempo")?,
        dividers: args.json_literal("dividers")?,
        page: args.optional_integer("page")?,
        subpage: args.optional_integer("subpage")?,
        group: args.optional("group")?,
        feedback: args.flag("feedback")?,
        coloured: args.flag("coloured")?,
        momentary: args.integer("momentary")?,
    })
}

fn parse_cv_map(rest: &str) -> Result<CvMapping, ProtocolError> {
    let mut args = Args::new("cv_map", rest, 12);
    Ok(CvMapping {
        instance: args.text("instance")?,
        symbol: args.text("symbol")?,
        actuator: args.text("actuator")?,
        minimum: args.number("minimum")?,
        maximum: args.number("maximum")?,
        steps: args.integer("steps")?,
        label: args.label("label")?,
        tempo: args.flag("tempo")?,
        dividers: args.json_literal("dividers")?,
        feedback: args.flag("feedback")?,
        operational_mode: args.text("operational_mode")?,
        group: args.optional("group")?,
    })
}

fn decode_base64_json<T: for<'de> Deserialize<'de>>(
    command: &'static str,
    payload: &str,
) -> Result<T, ProtocolError> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| ProtocolError::InvalidPayload {
            command,
            message: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| ProtocolError::InvalidPayload {
        command,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(frame: &str) -> Command {
        Command::parse(frame).unwrap()
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(parse("ping"), Command::Ping);
        assert_eq!(parse("ping\n"), Command::Ping);
    }

    #[test]
    fn test_parse_data_ready() {
        assert_eq!(parse("data_ready 42"), Command::DataReady { counter: 42 });
    }

    #[test]
    fn test_parse_param_set() {
        assert_eq!(
            parse("param_set /graph/eq gain -3.5"),
            Command::ParamSet {
                instance: "/graph/eq".to_string(),
                symbol: "gain".to_string(),
                value: -3.5
            }
        );
    }

    #[test]
    fn test_malformed_number_rejects_frame() {
        assert_eq!(
            Command::parse("param_set /graph/eq gain loud"),
            Err(ProtocolError::InvalidField {
                command: "param_set",
                field: "value",
                value: "loud".to_string()
            })
        );
        assert!(Command::parse("param_set /graph/eq gain NaN").is_err());
        assert!(Command::parse("param_set /graph/eq gain inf").is_err());
    }

    #[test]
    fn test_missing_field_rejects_frame() {
        assert_eq!(
            Command::parse("connect a/out"),
            Err(ProtocolError::MissingField {
                command: "connect",
                field: "target"
            })
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("frobnicate 1 2"),
            Err(ProtocolError::UnknownCommand("frobnicate".to_string()))
        );
        assert_eq!(Command::parse(""), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_parse_add() {
        assert_eq!(
            parse("add inst1 http://example.org/plugin 10 20 0 1.0 1"),
            Command::Add(AddPlugin {
                instance: "inst1".to_string(),
                uri: "http://example.org/plugin".to_string(),
                position: Position { x: 10.0, y: 20.0 },
                bypassed: false,
                version: "1.0".to_string(),
                official: true,
            })
        );
    }

    #[test]
    fn test_parse_add_without_version() {
        let Command::Add(add) = parse("add inst1 urn:a 1.5 2 1") else {
            panic!("Expected Add command");
        };
        assert!(add.bypassed);
        assert_eq!(add.version, "");
        assert!(!add.official);
    }

    #[test]
    fn test_parse_remove_all() {
        assert_eq!(parse("remove :all"), Command::Remove(RemoveTarget::All));
        assert_eq!(
            parse("remove /graph/eq"),
            Command::Remove(RemoveTarget::Instance("/graph/eq".to_string()))
        );
    }

    #[test]
    fn test_free_text_keeps_spaces() {
        assert_eq!(
            parse("pedal_snapshot 2 Lead Solo Boost"),
            Command::PedalSnapshot {
                index: 2,
                name: "Lead Solo Boost".to_string()
            }
        );
        assert_eq!(
            parse("log 2 disk is nearly full"),
            Command::Log {
                level: 2,
                message: "disk is nearly full".to_string()
            }
        );
    }

    #[test]
    fn test_parse_patch_set_values() {
        let Command::PatchSet { value, writable, .. } =
            parse("patch_set /graph/sampler 1 urn:sample p /data/My Samples/kick.wav")
        else {
            panic!("Expected PatchSet command");
        };
        assert!(writable);
        assert_eq!(value, PatchValue::Path("/data/My Samples/kick.wav".to_string()));

        let Command::PatchSet { value, .. } = parse("patch_set /graph/x 0 urn:gain f 0.25") else {
            panic!("Expected PatchSet command");
        };
        assert_eq!(value, PatchValue::Float(0.25));

        let Command::PatchSet { value, .. } = parse("patch_set /graph/x 0 urn:v v 1:2") else {
            panic!("Expected PatchSet command");
        };
        assert!(matches!(value, PatchValue::Raw { .. }));
    }

    #[test]
    fn test_parse_transport_and_preset() {
        assert_eq!(
            parse("transport 1 4 120.5 link"),
            Command::Transport(TransportState {
                rolling: true,
                beats_per_bar: 4.0,
                beats_per_minute: 120.5,
                sync_mode: "link".to_string(),
            })
        );
        assert_eq!(
            parse("preset /graph/eq null"),
            Command::Preset {
                instance: "/graph/eq".to_string(),
                uri: None
            }
        );
    }

    #[test]
    fn test_parse_hw_map() {
        let Command::HwMap(mapping) = parse(
            "hw_map /graph/eq gain /hmi/knob1 -12 12 33 Eq_Gain False {'1':'a'} 1 None Group1 1 0 0",
        ) else {
            panic!("Expected HwMap command");
        };
        assert_eq!(mapping.actuator, "/hmi/knob1");
        assert_eq!(mapping.label, "Eq Gain");
        assert!(!mapping.tempo);
        assert_eq!(mapping.dividers, Some(serde_json::json!({"1": "a"})));
        assert_eq!(mapping.page, Some(1));
        assert_eq!(mapping.subpage, None);
        assert_eq!(mapping.group.as_deref(), Some("Group1"));
        assert!(mapping.feedback);
        assert!(!mapping.coloured);
    }

    #[test]
    fn test_parse_cv_map() {
        let Command::CvMap(mapping) =
            parse("cv_map /graph/eq gain /cv/graph/lfo/out 0 1 33 Gain 0 None 1 + None")
        else {
            panic!("Expected CvMap command");
        };
        assert_eq!(mapping.operational_mode, "+");
        assert!(mapping.feedback);
        assert_eq!(mapping.group, None);
        assert_eq!(mapping.dividers, None);
    }

    #[test]
    fn test_parse_midi_map_keeps_negative_values() {
        let Command::MidiMap(mapping) = parse("midi_map /graph/eq gain -1 7 0 1") else {
            panic!("Expected MidiMap command");
        };
        assert_eq!(mapping.channel, -1);
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_parse_act_add_base64() {
        let json = r#"{"uri":"/hmi/footswitch1","name":"Foot 1","modes":":trigger:","steps":[],"max_assigns":1}"#;
        let frame = format!("act_add {}", BASE64.encode(json));
        let Command::ActuatorAdd(actuator) = parse(&frame) else {
            panic!("Expected ActuatorAdd command");
        };
        assert_eq!(actuator.uri, "/hmi/footswitch1");
        assert!(matches!(
            Command::parse("act_add !!notbase64!!"),
            Err(ProtocolError::InvalidPayload { command: "act_add", .. })
        ));
    }

    #[test]
    fn test_parse_rescan() {
        let json = r#"{"installed":["urn:a"],"removed":["urn:b","urn:c"]}"#;
        let Command::Rescan(report) = parse(&format!("rescan {}", BASE64.encode(json))) else {
            panic!("Expected Rescan command");
        };
        assert_eq!(report.installed, vec!["urn:a"]);
        assert_eq!(report.removed.len(), 2);
    }

    #[test]
    fn test_parse_hw_ports() {
        assert_eq!(
            parse("add_hw_port /graph/capture_1 audio 0 Capture_1 1"),
            Command::AddHwPort(HardwarePort {
                port: "/graph/capture_1".to_string(),
                kind: PortKind::Audio,
                is_output: false,
                name: "Capture 1".to_string(),
                index: 1,
            })
        );
        assert!(Command::parse("add_hw_port /graph/x video 0 X 1").is_err());
    }

    #[test]
    fn test_parse_device_lifecycle() {
        assert_eq!(
            parse("hw_add urn:dev:footex Footex _2 0.1.0"),
            Command::DeviceAdded {
                uri: "urn:dev:footex".to_string(),
                label: "Footex".to_string(),
                label_suffix: " 2".to_string(),
                version: "0.1.0".to_string(),
            }
        );
        assert_eq!(
            parse("hw_dis Footex 0.1.0"),
            Command::DeviceDisconnected {
                label: "Footex".to_string(),
                version: "0.1.0".to_string()
            }
        );
    }

    #[test]
    fn test_parse_loading_brackets() {
        assert_eq!(
            parse("loading_start 0 1"),
            Command::LoadingStart {
                empty: false,
                modified: true
            }
        );
        assert_eq!(parse("loading_end -1"), Command::LoadingEnd { snapshot_id: -1 });
    }

    #[test]
    fn test_name_matches_wire_name() {
        for frame in [
            "ping",
            "stop",
            "cc-device-updated",
            "bufsize 128",
            "load-pb-remote 12",
            "truebypass 1 0",
            "size 800 600",
            "stats 12.5 3",
            "sys_stats 40 1200000 55.2",
        ] {
            let command = parse(frame);
            assert_eq!(frame.split(' ').next().unwrap(), command.name());
        }
    }
}
