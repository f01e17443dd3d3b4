//! Contexts: named values attached to nodes.

use crate::binding::BindingHandle;
use crate::error::PathError;
use crate::node::NodeId;
use crate::path::Path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The reserved id of the process-wide global context.
pub const GLOBAL_CONTEXT_ID: &str = "global";

/// A named value scope.
///
/// The serialized form is `{"id": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextData {
    pub id: String,
    pub value: Value,
}

impl ContextData {
    pub fn new(id: impl Into<String>, value: Value) -> ContextData {
        ContextData {
            id: id.into(),
            value,
        }
    }

    /// Returns a new context with `value` placed at `path`.
    pub fn with_value_at(&self, path: &Path, value: Value) -> Result<ContextData, PathError> {
        Ok(ContextData {
            id: self.id.clone(),
            value: path.set(&self.value, value)?,
        })
    }
}

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Returns a version number that has never been handed out before in this process.
pub(crate) fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// A context as attached to a node, along with its evaluation cache and dependents.
#[derive(Debug)]
pub struct ContextBinding {
    context: ContextData,
    version: u64,
    cache: HashMap<Path, Option<Value>>,
    bindings: Vec<BindingHandle>,
}

/// A context binding shared between a manager and its propagation paths.
pub type SharedContext = Arc<Mutex<ContextBinding>>;

impl ContextBinding {
    pub fn new(context: ContextData) -> ContextBinding {
        ContextBinding {
            context,
            version: next_version(),
            cache: HashMap::new(),
            bindings: Vec::new(),
        }
    }

    pub fn shared(context: ContextData) -> SharedContext {
        Arc::new(Mutex::new(ContextBinding::new(context)))
    }

    pub fn context(&self) -> &ContextData {
        &self.context
    }

    pub fn id(&self) -> &str {
        &self.context.id
    }

    /// Changes every time the context data is replaced.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the context data. Invalidates the whole cache; dependents are kept.
    pub(crate) fn replace(&mut self, context: ContextData) {
        self.context = context;
        self.version = next_version();
        self.cache.clear();
    }

    /// Looks up a path in the context value, going through the cache.
    pub(crate) fn lookup(&mut self, path: &Path) -> Option<Value> {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }
        let value = path.get(&self.context.value).cloned();
        self.cache.insert(path.clone(), value.clone());
        value
    }

    /// Number of cached path evaluations.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn bindings(&self) -> &[BindingHandle] {
        &self.bindings
    }

    /// Adds a dependent unless it is already attached.
    pub(crate) fn attach(&mut self, binding: &BindingHandle) {
        if !self.bindings.iter().any(|b| b.same_as(binding)) {
            self.bindings.push(binding.clone());
        }
    }

    pub(crate) fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    /// Drops all dependents owned by a node.
    pub(crate) fn remove_bindings_of(&mut self, owner: NodeId) {
        self.bindings.retain(|binding| binding.owner() != owner);
    }
}
