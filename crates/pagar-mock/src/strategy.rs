//! Test helper strategies: mock-backed vs. live-backed.
//!
//! A helper is instantiated per request and is stateless beyond referencing
//! the current session store (mock variant). Which variant the factory
//! produces reflects configuration only, never the engine's activation state:
//! a mock helper can be requested while live testing is toggled on.

use crate::result::{PagarError, PagarResult};
use crate::store::SharedStore;
use serde_json::Value;
use std::str::FromStr;
use std::sync::PoisonError;
use uuid::Uuid;

/// The closed set of test helper strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Helpers backed by the in-process mock session
    #[default]
    Mock,
    /// Helpers backed by a live account
    Live,
}

impl StrategyKind {
    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Live => "live",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = PagarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mock" => Ok(Self::Mock),
            "live" => Ok(Self::Live),
            other => Err(PagarError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A test helper produced by the strategy factory
#[derive(Debug)]
pub enum TestStrategy {
    /// Mock-backed helper
    Mock(MockStrategy),
    /// Live-backed helper
    Live(LiveStrategy),
}

impl TestStrategy {
    /// Build the helper for the requested kind
    #[must_use]
    pub fn new(kind: StrategyKind, store: Option<SharedStore>) -> Self {
        match kind {
            StrategyKind::Mock => Self::Mock(MockStrategy::new(store)),
            StrategyKind::Live => Self::Live(LiveStrategy),
        }
    }

    /// Which strategy this helper implements
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::Mock(_) => StrategyKind::Mock,
            Self::Live(_) => StrategyKind::Live,
        }
    }

    /// Whether this is the mock variant
    #[must_use]
    pub const fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }

    /// Whether this is the live variant
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Borrow the mock helper, if that is the active variant
    #[must_use]
    pub const fn as_mock(&self) -> Option<&MockStrategy> {
        match self {
            Self::Mock(mock) => Some(mock),
            Self::Live(_) => None,
        }
    }
}

/// Mock-backed helper: seeds and inspects simulated records directly
///
/// These are the privileged test-setup calls that mutate the session store
/// without going through dispatch. Every method requires an active session.
#[derive(Debug)]
pub struct MockStrategy {
    store: Option<SharedStore>,
}

impl MockStrategy {
    /// Create a helper over the current session store, if any
    #[must_use]
    pub fn new(store: Option<SharedStore>) -> Self {
        Self { store }
    }

    fn store(&self, operation: &str) -> PagarResult<&SharedStore> {
        self.store
            .as_ref()
            .ok_or_else(|| PagarError::unstarted(operation))
    }

    /// Generate an id with the conventional `prefix_hex` shape
    #[must_use]
    pub fn new_id(prefix: &str) -> String {
        let tail = Uuid::new_v4().simple().to_string();
        format!("{prefix}_{}", &tail[..14])
    }

    /// Seed a record under a generated id, returning the id
    pub fn create_resource(
        &self,
        resource_type: &str,
        id_prefix: &str,
        mut record: Value,
    ) -> PagarResult<String> {
        let id = Self::new_id(id_prefix);
        if let Value::Object(map) = &mut record {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        self.store("create_resource")?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(resource_type, &id, record);
        Ok(id)
    }

    /// Seed a record under an explicit id
    pub fn insert(&self, resource_type: &str, id: &str, record: Value) -> PagarResult<()> {
        self.store("insert")?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(resource_type, id, record);
        Ok(())
    }

    /// Fetch a record for inspection
    pub fn fetch(&self, resource_type: &str, id: &str) -> PagarResult<Option<Value>> {
        Ok(self
            .store("fetch")?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource_type, id)
            .cloned())
    }

    /// All records of a type, in stable id order
    pub fn list(&self, resource_type: &str) -> PagarResult<Vec<(String, Value)>> {
        Ok(self
            .store("list")?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .all(resource_type))
    }

    /// Number of records of a type
    pub fn count(&self, resource_type: &str) -> PagarResult<usize> {
        Ok(self
            .store("count")?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count(resource_type))
    }
}

/// Live-backed helper marker
///
/// The live surface talks to a real account through the caller's own client;
/// what that looks like per resource domain is the caller's concern. The
/// variant exists so configuration can select live behavior through the same
/// factory that produces mock helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveStrategy;
