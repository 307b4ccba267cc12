//! Session-scoped storage for simulated resources.
//!
//! Each mock session owns exactly one store. Records are JSON values keyed by
//! resource type ("customers", "charges", ...) and resource id, mutated only
//! by dispatch handlers or privileged test-setup calls. The store never
//! survives its session: deactivation discards it and the next activation
//! starts empty.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Shared handle to a session store
///
/// Handlers and mock-strategy helpers hold clones of this handle for the
/// lifetime of one session. Activation must be serialized by the test
/// framework; the lock only guards against accidental overlap, not against a
/// concurrent-session model.
pub type SharedStore = Arc<Mutex<SessionStore>>;

/// In-memory store of simulated resource collections
#[derive(Debug, Default)]
pub struct SessionStore {
    collections: HashMap<String, BTreeMap<String, Value>>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind a shared handle
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Look up a record by resource type and id
    #[must_use]
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&Value> {
        self.collections.get(resource_type).and_then(|c| c.get(id))
    }

    /// Insert or replace a record
    pub fn set(&mut self, resource_type: &str, id: &str, record: Value) {
        self.collections
            .entry(resource_type.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// Remove a record, returning it if present
    pub fn remove(&mut self, resource_type: &str, id: &str) -> Option<Value> {
        self.collections
            .get_mut(resource_type)
            .and_then(|c| c.remove(id))
    }

    /// Check whether a record exists
    #[must_use]
    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.get(resource_type, id).is_some()
    }

    /// All records of a resource type, in stable id order
    #[must_use]
    pub fn all(&self, resource_type: &str) -> Vec<(String, Value)> {
        self.collections
            .get(resource_type)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of records of a resource type
    #[must_use]
    pub fn count(&self, resource_type: &str) -> usize {
        self.collections.get(resource_type).map_or(0, BTreeMap::len)
    }

    /// Discard every collection
    pub fn clear(&mut self) {
        self.collections.clear();
    }

    /// Whether the store holds no records at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(BTreeMap::is_empty)
    }
}
