//! Pedalboard state-sync core library
//!
//! This crate holds the client-side model of a pedalboard device: the wire
//! protocol the device speaks, the connection index, the deferred binding
//! registry, hardware mappings and the plugin catalog merge.
//! It is a pure library with no I/O. Networking and the event loop belong in
//! the client layer.

pub mod binder;
pub mod catalog;
pub mod connections;
pub mod groups;
pub mod mappings;
pub mod protocol;
pub mod types;

// Re-export commonly used items
pub use binder::{BindingKey, PendingBindings, Watch};
pub use catalog::{CatalogSnapshot, LicenseManager, PluginView};
pub use connections::ConnectionIndex;
pub use protocol::{Command, ProtocolError};
pub use types::{PluginMetadata, PluginVersion};
