//! Hardware, CV and MIDI mappings of plugin parameters.
//!
//! Each kind of mapping is stored independently, keyed by (instance, symbol).
//! The registry also tracks the actuators the device advertises and the
//! external control devices attached to it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parameter assigned to a physical actuator (knob, footswitch...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareMapping {
    pub instance: String,
    pub symbol: String,
    pub actuator: String,
    pub minimum: f64,
    pub maximum: f64,
    pub steps: i64,
    pub label: String,
    pub tempo: bool,
    pub dividers: Option<serde_json::Value>,
    pub page: Option<u32>,
    pub subpage: Option<u32>,
    pub group: Option<String>,
    pub feedback: bool,
    pub coloured: bool,
    pub momentary: u32,
}

/// A parameter driven by a CV input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvMapping {
    pub instance: String,
    pub symbol: String,
    pub actuator: String,
    pub minimum: f64,
    pub maximum: f64,
    pub steps: i64,
    pub label: String,
    pub tempo: bool,
    pub dividers: Option<serde_json::Value>,
    pub feedback: bool,
    pub operational_mode: String,
    pub group: Option<String>,
}

/// A parameter learned to a MIDI CC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MidiMapping {
    pub instance: String,
    pub symbol: String,
    pub channel: i32,
    pub control: i32,
    pub minimum: f64,
    pub maximum: f64,
}

impl MidiMapping {
    pub fn validate(&self) -> Result<(), MappingError> {
        if self.channel < 0 {
            return Err(MappingError::InvalidChannel(self.channel));
        }
        if self.control < 0 {
            return Err(MappingError::InvalidControl(self.control));
        }
        if self.minimum >= self.maximum {
            return Err(MappingError::InvalidRange {
                minimum: self.minimum,
                maximum: self.maximum,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("invalid MIDI channel {0}")]
    InvalidChannel(i32),
    #[error("invalid MIDI control {0}")]
    InvalidControl(i32),
    #[error("invalid range: minimum {minimum} is not below maximum {maximum}")]
    InvalidRange { minimum: f64, maximum: f64 },
}

/// Actuator descriptor advertised by the device (`act_add`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    /// Colon-delimited list of supported addressing modes
    #[serde(default)]
    pub modes: String,
    #[serde(default)]
    pub steps: Vec<u32>,
    #[serde(default)]
    pub max_assigns: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// External control device plugged into the pedalboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareDevice {
    pub uri: String,
    pub label: String,
    pub label_suffix: String,
    pub version: String,
    pub connected: bool,
}

type ParamKey = (String, String);

fn key(instance: &str, symbol: &str) -> ParamKey {
    (instance.to_string(), symbol.to_string())
}

#[derive(Debug, Default)]
pub struct MappingRegistry {
    hardware: HashMap<ParamKey, HardwareMapping>,
    cv: HashMap<ParamKey, CvMapping>,
    midi: HashMap<ParamKey, MidiMapping>,
    actuators: BTreeMap<String, Actuator>,
    devices: BTreeMap<String, HardwareDevice>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_hardware(&mut self, mapping: HardwareMapping) -> Option<HardwareMapping> {
        self.hardware
            .insert(key(&mapping.instance, &mapping.symbol), mapping)
    }

    pub fn unmap_hardware(&mut self, instance: &str, symbol: &str) -> Option<HardwareMapping> {
        self.hardware.remove(&key(instance, symbol))
    }

    pub fn hardware(&self, instance: &str, symbol: &str) -> Option<&HardwareMapping> {
        self.hardware.get(&key(instance, symbol))
    }

    pub fn map_cv(&mut self, mapping: CvMapping) -> Option<CvMapping> {
        self.cv.insert(key(&mapping.instance, &mapping.symbol), mapping)
    }

    pub fn unmap_cv(&mut self, instance: &str, symbol: &str) -> Option<CvMapping> {
        self.cv.remove(&key(instance, symbol))
    }

    pub fn cv(&self, instance: &str, symbol: &str) -> Option<&CvMapping> {
        self.cv.get(&key(instance, symbol))
    }

    /// Store a MIDI mapping after validating it. Invalid mappings are not stored.
    pub fn map_midi(&mut self, mapping: MidiMapping) -> Result<Option<MidiMapping>, MappingError> {
        mapping.validate()?;
        Ok(self
            .midi
            .insert(key(&mapping.instance, &mapping.symbol), mapping))
    }

    pub fn unmap_midi(&mut self, instance: &str, symbol: &str) -> Option<MidiMapping> {
        self.midi.remove(&key(instance, symbol))
    }

    pub fn midi(&self, instance: &str, symbol: &str) -> Option<&MidiMapping> {
        self.midi.get(&key(instance, symbol))
    }

    /// Total number of parameter mappings of all kinds
    pub fn mapping_count(&self) -> usize {
        self.hardware.len() + self.cv.len() + self.midi.len()
    }

    /// Drop every mapping of `instance`.
    pub fn remove_instance(&mut self, instance: &str) {
        self.hardware.retain(|(i, _), _| i != instance);
        self.cv.retain(|(i, _), _| i != instance);
        self.midi.retain(|(i, _), _| i != instance);
    }

    /// Drop every parameter mapping; actuators and devices are kept.
    pub fn clear_mappings(&mut self) {
        self.hardware.clear();
        self.cv.clear();
        self.midi.clear();
    }

    /// Drop CV mappings driven by `port`. Returns the dropped mappings.
    pub fn remove_cv_source(&mut self, port: &str) -> Vec<CvMapping> {
        let doomed: Vec<ParamKey> = self
            .cv
            .iter()
            .filter(|(_, mapping)| mapping.actuator == port)
            .map(|(key, _)| key.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| self.cv.remove(&key))
            .collect()
    }

    pub fn add_actuator(&mut self, actuator: Actuator) {
        self.actuators.insert(actuator.uri.clone(), actuator);
    }

    pub fn remove_actuator(&mut self, uri: &str) -> Option<Actuator> {
        self.actuators.remove(uri)
    }

    pub fn actuators(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.values()
    }

    pub fn add_device(&mut self, device: HardwareDevice) {
        self.devices.insert(device.uri.clone(), device);
    }

    pub fn remove_device(&mut self, uri: &str) -> Option<HardwareDevice> {
        self.devices.remove(uri)
    }

    /// Flag every device with `label` as (dis)connected. Returns how many matched.
    pub fn set_device_connected(&mut self, label: &str, connected: bool) -> usize {
        let mut matched = 0;
        for device in self.devices.values_mut().filter(|d| d.label == label) {
            device.connected = connected;
            matched += 1;
        }
        matched
    }

    pub fn devices(&self) -> impl Iterator<Item = &HardwareDevice> {
        self.devices.values()
    }
}
