//! Deferred bindings for nodes that do not exist yet.
//!
//! Plugin nodes materialize some time after their `add` command, once the
//! plugin metadata has been fetched and the canvas has drawn them. Commands
//! referring to those nodes (connections, finalizing a freshly added plugin)
//! can arrive before that happens. They are parked here under the selector of
//! the missing node and handed back exactly once when the node is created.

use std::collections::HashMap;
use std::fmt;

/// A node on the pedalboard canvas that bindings can wait for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// The node of a plugin instance
    Instance(String),
    /// A connectable port, either on a plugin or a hardware/CV port
    Port(String),
}

impl BindingKey {
    pub fn instance(id: impl Into<String>) -> Self {
        Self::Instance(id.into())
    }

    pub fn port(id: impl Into<String>) -> Self {
        Self::Port(id.into())
    }

    /// CSS attribute selector matching the node, with the id escaped.
    pub fn selector(&self) -> String {
        match self {
            BindingKey::Instance(id) => format!("[mod-instance=\"{}\"]", escape_css_string(id)),
            BindingKey::Port(id) => format!("[mod-port=\"{}\"]", escape_css_string(id)),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// Escape a value for use inside a double-quoted CSS string.
fn escape_css_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\a "),
            c if c.is_control() => escaped.push_str(&format!("\\{:x} ", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Handle of a pending binding, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

/// Outcome of [`PendingBindings::watch`].
#[derive(Debug, PartialEq)]
pub enum Watch<A> {
    /// The node already exists; run the action now.
    Ready(A),
    /// The action was parked until the node is created.
    Deferred(BindingId),
}

#[derive(Debug)]
struct Pending<A> {
    id: BindingId,
    action: A,
}

/// Registry of present nodes and of actions waiting for absent ones.
#[derive(Debug)]
pub struct PendingBindings<A> {
    /// selector -> key of every node known to exist
    present: HashMap<String, BindingKey>,
    /// selector -> actions waiting for that node, in registration order
    pending: HashMap<String, Vec<Pending<A>>>,
    next_id: u64,
}

impl<A> Default for PendingBindings<A> {
    fn default() -> Self {
        Self {
            present: HashMap::new(),
            pending: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<A: PartialEq> PendingBindings<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self, key: &BindingKey) -> bool {
        self.present.contains_key(&key.selector())
    }

    /// Number of actions still waiting.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_pending(&self, key: &BindingKey, action: &A) -> bool {
        self.pending
            .get(&key.selector())
            .is_some_and(|waiting| waiting.iter().any(|p| &p.action == action))
    }

    /// Run `action` once `key` exists.
    ///
    /// If the node is already present the action is handed straight back, so
    /// there is no window in which a creation can be missed. Registering an
    /// action equal to one already waiting on the same key returns the
    /// existing binding instead of adding a second one.
    pub fn watch(&mut self, key: BindingKey, action: A) -> Watch<A> {
        let selector = key.selector();
        if self.present.contains_key(&selector) {
            return Watch::Ready(action);
        }

        let waiting = self.pending.entry(selector).or_default();
        if let Some(existing) = waiting.iter().find(|p| p.action == action) {
            return Watch::Deferred(existing.id);
        }

        let id = BindingId(self.next_id);
        self.next_id += 1;
        waiting.push(Pending { id, action });
        Watch::Deferred(id)
    }

    /// Record that `key` now exists and take every action waiting for it.
    pub fn mark_created(&mut self, key: &BindingKey) -> Vec<A> {
        let selector = key.selector();
        let fired = self
            .pending
            .remove(&selector)
            .map(|waiting| waiting.into_iter().map(|p| p.action).collect())
            .unwrap_or_default();
        self.present.insert(selector, key.clone());
        fired
    }

    /// Record that `key` no longer exists. Waiting actions stay parked.
    pub fn mark_removed(&mut self, key: &BindingKey) {
        self.present.remove(&key.selector());
    }

    /// Forget every present node matching `predicate`.
    pub fn mark_removed_where(&mut self, predicate: impl Fn(&BindingKey) -> bool) {
        self.present.retain(|_, key| !predicate(key));
    }

    /// Cancel a single binding.
    pub fn unwatch(&mut self, id: BindingId) -> Option<A> {
        let mut cancelled = None;
        for waiting in self.pending.values_mut() {
            if let Some(pos) = waiting.iter().position(|p| p.id == id) {
                cancelled = Some(waiting.remove(pos).action);
                break;
            }
        }
        self.pending.retain(|_, waiting| !waiting.is_empty());
        cancelled
    }

    /// Cancel every binding whose action matches `predicate`.
    pub fn unwatch_where(&mut self, predicate: impl Fn(&A) -> bool) -> Vec<A> {
        let mut cancelled = Vec::new();
        for waiting in self.pending.values_mut() {
            let (drop, keep): (Vec<_>, Vec<_>) =
                std::mem::take(waiting).into_iter().partition(|p| predicate(&p.action));
            *waiting = keep;
            cancelled.extend(drop.into_iter().map(|p| p.action));
        }
        self.pending.retain(|_, waiting| !waiting.is_empty());
        cancelled
    }

    /// Drop every waiting action.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Connect(&'static str, &'static str),
        Finalize(&'static str),
    }

    #[test]
    fn test_selector_escapes_quotes() {
        assert_eq!(
            BindingKey::port("/graph/eq/in").selector(),
            "[mod-port=\"/graph/eq/in\"]"
        );
        assert_eq!(
            BindingKey::instance("a\"b").selector(),
            "[mod-instance=\"a\\\"b\"]"
        );
    }

    #[test]
    fn test_watch_on_present_key_is_ready() {
        let mut bindings = PendingBindings::new();
        let key = BindingKey::instance("eq");
        assert!(bindings.mark_created(&key).is_empty());
        assert_eq!(
            bindings.watch(key, Action::Finalize("eq")),
            Watch::Ready(Action::Finalize("eq"))
        );
        assert_eq!(bindings.pending_len(), 0);
    }

    #[test]
    fn test_deferred_action_fires_once() {
        let mut bindings = PendingBindings::new();
        let key = BindingKey::port("b/in");
        assert!(matches!(
            bindings.watch(key.clone(), Action::Connect("a/out", "b/in")),
            Watch::Deferred(_)
        ));
        assert_eq!(bindings.pending_len(), 1);

        let fired = bindings.mark_created(&key);
        assert_eq!(fired, vec![Action::Connect("a/out", "b/in")]);
        assert!(bindings.mark_created(&key).is_empty());
        assert_eq!(bindings.pending_len(), 0);
    }

    #[test]
    fn test_identical_watch_is_deduplicated() {
        let mut bindings = PendingBindings::new();
        let key = BindingKey::port("b/in");
        let first = bindings.watch(key.clone(), Action::Connect("a/out", "b/in"));
        let second = bindings.watch(key.clone(), Action::Connect("a/out", "b/in"));
        assert_eq!(first, second);
        assert_eq!(bindings.pending_len(), 1);
    }

    #[test]
    fn test_unwatch_cancels() {
        let mut bindings = PendingBindings::new();
        let key = BindingKey::port("b/in");
        let Watch::Deferred(id) = bindings.watch(key.clone(), Action::Connect("a/out", "b/in"))
        else {
            panic!("expected deferred binding");
        };
        bindings.watch(key.clone(), Action::Connect("c/out", "b/in"));

        assert_eq!(bindings.unwatch(id), Some(Action::Connect("a/out", "b/in")));
        assert_eq!(bindings.unwatch(id), None);
        assert_eq!(bindings.mark_created(&key), vec![Action::Connect("c/out", "b/in")]);
    }

    #[test]
    fn test_unwatch_where_and_removal() {
        let mut bindings = PendingBindings::new();
        bindings.watch(BindingKey::port("b/in"), Action::Connect("a/out", "b/in"));
        bindings.watch(BindingKey::instance("b"), Action::Finalize("b"));

        let cancelled = bindings.unwatch_where(|a| matches!(a, Action::Finalize(_)));
        assert_eq!(cancelled, vec![Action::Finalize("b")]);
        assert_eq!(bindings.pending_len(), 1);

        let key = BindingKey::port("b/in");
        bindings.mark_created(&key);
        assert!(bindings.is_present(&key));
        bindings.mark_removed(&key);
        assert!(!bindings.is_present(&key));
    }
}
