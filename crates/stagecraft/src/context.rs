//! Request-scoped execution contexts
//!
//! An [`ExecutionContext`] is an ordered map of string keys to opaque JSON
//! values, plus a list of declared collaborator actors. A proxy snapshots
//! the context at the moment of enqueue, so a supervisor informed of a later
//! failure reads the keys present when the call was made, not the keys at
//! delivery time.
//!
//! The distinguished empty context silently drops mutations. It backs
//! invocations made outside any request scope.

use crate::actor::ActorHandle;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value context attached to invocations and propagated to collaborators
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: BTreeMap<String, Value>,
    collaborators: Vec<ActorHandle>,
    sink: bool,
}

impl ExecutionContext {
    /// Fresh mutable context with no keys and no collaborators
    pub fn new() -> Self {
        Self::default()
    }

    /// The distinguished empty context
    ///
    /// Ignores `set`; `copy` and `propagate` remain valid.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            collaborators: Vec::new(),
            sink: true,
        }
    }

    /// Whether this is the distinguished empty context
    pub fn is_empty_context(&self) -> bool {
        self.sink
    }

    /// Value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Store `value` under `key`; silently ignored on the empty context
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if self.sink {
            return;
        }
        self.entries.insert(key.into(), value);
    }

    /// Remove all keys
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Whether any keys are present
    pub fn has_context(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Number of keys
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Structurally-independent clone of the map and collaborator list
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Declare collaborator actors that `propagate` targets
    pub fn collaborators(&mut self, handles: Vec<ActorHandle>) {
        self.collaborators.extend(handles);
    }

    /// Declared collaborators
    pub fn collaborator_handles(&self) -> &[ActorHandle] {
        &self.collaborators
    }

    /// Replace each collaborator's declarative context map with a shallow
    /// copy of this one's map
    ///
    /// The collaborator keeps its own collaborator list; only the entries
    /// are replaced.
    pub fn propagate(&self) {
        for collaborator in &self.collaborators {
            collaborator.replace_execution_context(self.entries.clone());
        }
    }

    pub(crate) fn replace_entries(&mut self, entries: BTreeMap<String, Value>) {
        if self.sink {
            return;
        }
        self.entries = entries;
    }
}
