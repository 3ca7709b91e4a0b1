//! Index of the connections currently drawn on the pedalboard.
//!
//! A connection is an ordered (source, target) pair of port ids. The index
//! holds each pair at most once; callers test presence before creating.

use std::collections::{BTreeSet, HashMap};

use crate::types::port_belongs_to;

#[derive(Debug, Clone, Default)]
pub struct ConnectionIndex {
    /// source port -> set of target ports
    by_source: HashMap<String, BTreeSet<String>>,
    len: usize,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, source: &str, target: &str) -> bool {
        self.by_source
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Record a connection. Returns false if the pair was already present.
    pub fn insert(&mut self, source: &str, target: &str) -> bool {
        let inserted = self
            .by_source
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string());
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Forget a connection. Returns false if the pair was not present.
    pub fn remove(&mut self, source: &str, target: &str) -> bool {
        let Some(targets) = self.by_source.get_mut(source) else {
            return false;
        };
        let removed = targets.remove(target);
        if targets.is_empty() {
            self.by_source.remove(source);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Whether `source` still feeds at least one target.
    pub fn has_connections_from(&self, source: &str) -> bool {
        self.by_source.contains_key(source)
    }

    /// Remove every connection that touches `port`, returning the removed pairs.
    pub fn remove_port(&mut self, port: &str) -> Vec<(String, String)> {
        self.remove_matching(|source, target| source == port || target == port)
    }

    /// Remove every connection that touches a port of `instance`.
    pub fn remove_instance(&mut self, instance: &str) -> Vec<(String, String)> {
        self.remove_matching(|source, target| {
            port_belongs_to(source, instance) || port_belongs_to(target, instance)
        })
    }

    pub fn clear(&mut self) {
        self.by_source.clear();
        self.len = 0;
    }

    /// All connections, ordered by source then target.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut sources: Vec<_> = self.by_source.iter().collect();
        sources.sort_by(|a, b| a.0.cmp(b.0));
        sources.into_iter().flat_map(|(source, targets)| {
            targets
                .iter()
                .map(move |target| (source.as_str(), target.as_str()))
        })
    }

    fn remove_matching(&mut self, matches: impl Fn(&str, &str) -> bool) -> Vec<(String, String)> {
        let doomed: Vec<(String, String)> = self
            .iter()
            .filter(|&(source, target)| matches(source, target))
            .map(|(source, target)| (source.to_string(), target.to_string()))
            .collect();
        for (source, target) in &doomed {
            self.remove(source, target);
        }
        doomed
    }
}
