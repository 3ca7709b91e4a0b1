//! Arrangement of a plugin's control ports by port group.
//!
//! Grouped ports render contiguously with a border around each group run, so
//! the canvas needs them sorted by group and the first/last port of each run
//! flagged.

use serde::Serialize;
use tracing::debug;

use crate::types::{ControlPort, PluginMetadata};

/// Number of distinct group colours the canvas styles cycle through
pub const GROUP_COLOR_COUNT: usize = 32;

/// Resolved port group of a control port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRef {
    pub uri: String,
    pub symbol: String,
    pub name: String,
    /// Position of the group in the plugin's group list
    pub index: usize,
    /// Colour slot, `index % GROUP_COLOR_COUNT`
    pub color_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrangedPort {
    pub port: ControlPort,
    pub group: Option<GroupRef>,
    pub group_start: bool,
    pub group_end: bool,
}

/// Sort the control inputs of `metadata` so grouped ports are contiguous.
///
/// Ungrouped ports come first, then each group in declaration order. Within
/// a group the original port order is kept.
pub fn arrange_control_ports(metadata: &PluginMetadata) -> Vec<ArrangedPort> {
    let mut arranged: Vec<(usize, ArrangedPort)> = metadata
        .ports
        .control
        .input
        .iter()
        .enumerate()
        .map(|(original, port)| {
            let group = port.group.as_deref().and_then(|uri| resolve_group(metadata, uri));
            (
                original,
                ArrangedPort {
                    port: port.clone(),
                    group,
                    group_start: false,
                    group_end: false,
                },
            )
        })
        .collect();

    arranged.sort_by_key(|(original, entry)| (entry.group.as_ref().map(|g| g.index), *original));

    let mut ports: Vec<ArrangedPort> = arranged.into_iter().map(|(_, entry)| entry).collect();
    mark_group_boundaries(&mut ports);
    ports
}

fn resolve_group(metadata: &PluginMetadata, uri: &str) -> Option<GroupRef> {
    let found = metadata
        .port_groups
        .iter()
        .enumerate()
        .find(|(_, group)| group.uri == uri)
        .map(|(index, group)| GroupRef {
            uri: group.uri.clone(),
            symbol: group.symbol.clone(),
            name: group.name.clone(),
            index,
            color_index: index % GROUP_COLOR_COUNT,
        });
    if found.is_none() {
        debug!("{}: unknown port group {}", metadata.uri, uri);
    }
    found
}

fn mark_group_boundaries(ports: &mut [ArrangedPort]) {
    let group_of = |port: &ArrangedPort| port.group.as_ref().map(|g| g.index);
    for i in 0..ports.len() {
        let Some(current) = group_of(&ports[i]) else {
            continue;
        };
        let previous = i.checked_sub(1).and_then(|p| group_of(&ports[p]));
        let next = ports.get(i + 1).and_then(group_of);
        ports[i].group_start = previous != Some(current);
        ports[i].group_end = next != Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortGroup;

    fn control(index: u32, symbol: &str, group: Option<&str>) -> ControlPort {
        ControlPort {
            index,
            symbol: symbol.to_string(),
            name: symbol.to_uppercase(),
            group: group.map(str::to_string),
            ..Default::default()
        }
    }

    fn group(uri: &str) -> PortGroup {
        PortGroup {
            uri: uri.to_string(),
            symbol: uri.rsplit('#').next().unwrap_or(uri).to_string(),
            name: uri.to_string(),
        }
    }

    fn metadata(ports: Vec<ControlPort>, groups: Vec<PortGroup>) -> PluginMetadata {
        let mut metadata = PluginMetadata {
            uri: "urn:test:eq".to_string(),
            port_groups: groups,
            ..Default::default()
        };
        metadata.ports.control.input = ports;
        metadata
    }

    #[test]
    fn test_groups_sorted_and_contiguous() {
        let metadata = metadata(
            vec![
                control(0, "low_gain", Some("urn:eq#low")),
                control(1, "master", None),
                control(2, "high_gain", Some("urn:eq#high")),
                control(3, "low_freq", Some("urn:eq#low")),
                control(4, "high_freq", Some("urn:eq#high")),
            ],
            vec![group("urn:eq#low"), group("urn:eq#high")],
        );

        let arranged = arrange_control_ports(&metadata);
        let symbols: Vec<_> = arranged.iter().map(|p| p.port.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            vec!["master", "low_gain", "low_freq", "high_gain", "high_freq"]
        );

        let flags: Vec<_> = arranged
            .iter()
            .map(|p| (p.group_start, p.group_end))
            .collect();
        assert_eq!(
            flags,
            vec![
                (false, false),
                (true, false),
                (false, true),
                (true, false),
                (false, true)
            ]
        );
    }

    #[test]
    fn test_single_port_group_is_start_and_end() {
        let metadata = metadata(
            vec![control(0, "solo", Some("urn:g#a"))],
            vec![group("urn:g#a")],
        );
        let arranged = arrange_control_ports(&metadata);
        assert!(arranged[0].group_start);
        assert!(arranged[0].group_end);
    }

    #[test]
    fn test_color_index_wraps() {
        let groups: Vec<_> = (0..40).map(|i| group(&format!("urn:g#{}", i))).collect();
        let metadata = metadata(vec![control(0, "p", Some("urn:g#35"))], groups);
        let arranged = arrange_control_ports(&metadata);
        let group = arranged[0].group.as_ref().unwrap();
        assert_eq!(group.index, 35);
        assert_eq!(group.color_index, 3);
    }

    #[test]
    fn test_unknown_group_is_ungrouped() {
        let metadata = metadata(vec![control(0, "p", Some("urn:missing"))], vec![]);
        let arranged = arrange_control_ports(&metadata);
        assert!(arranged[0].group.is_none());
        assert!(!arranged[0].group_start);
    }
}
