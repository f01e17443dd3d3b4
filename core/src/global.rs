//! The process-wide global context.

use crate::context::{ContextData, GLOBAL_CONTEXT_ID};
use crate::error::ContextUpdateError;
use crate::path::Path;
use core::fmt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// How deeply listeners may re-enter [`GlobalContext::set`].
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Identifies a listener registered with [`GlobalContext::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ContextData) + Send + Sync>;

struct GlobalState {
    data: ContextData,
    next_subscription: u64,
    listeners: BTreeMap<SubscriptionId, Listener>,
    depth: usize,
}

/// The global context service.
///
/// Cloning yields another handle to the same context. Every context manager created with a handle
/// observes the same value; writes are last-write-wins in arrival order.
#[derive(Clone)]
pub struct GlobalContext {
    state: Arc<Mutex<GlobalState>>,
    max_depth: usize,
}

impl GlobalContext {
    pub fn new() -> GlobalContext {
        GlobalContext::with_value(Value::Null)
    }

    pub fn with_value(value: Value) -> GlobalContext {
        GlobalContext {
            state: Arc::new(Mutex::new(GlobalState {
                data: ContextData::new(GLOBAL_CONTEXT_ID, value),
                next_subscription: 0,
                listeners: BTreeMap::new(),
                depth: 0,
            })),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> GlobalContext {
        self.max_depth = max_depth;
        self
    }

    /// The current global context.
    pub fn get(&self) -> ContextData {
        self.state.lock().data.clone()
    }

    /// Registers a listener that is called with the new context after every change.
    ///
    /// Listeners may be called re-entrantly (a listener that sets the global context will see its
    /// own change), hence `Fn`.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: 'static + Fn(&ContextData) + Send + Sync,
    {
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().listeners.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Places `value` at `path` (the whole value if `None`) and notifies all listeners.
    ///
    /// Listeners run without the internal lock held, so they may call `set` again; nesting deeper
    /// than the configured depth fails with [`ContextUpdateError::CascadeLimit`].
    pub fn set(&self, path: Option<&Path>, value: Value) -> Result<(), ContextUpdateError> {
        let (data, listeners) = {
            let mut state = self.state.lock();
            if state.depth >= self.max_depth {
                warn!(depth = state.depth, "global context update nested too deeply");
                return Err(ContextUpdateError::CascadeLimit(self.max_depth));
            }
            let data = match path {
                Some(path) => state.data.with_value_at(path, value)?,
                None => ContextData::new(GLOBAL_CONTEXT_ID, value),
            };
            state.data = data.clone();
            state.depth += 1;
            let listeners: Vec<Listener> = state.listeners.values().cloned().collect();
            (data, listeners)
        };

        for listener in listeners {
            listener(&data);
        }

        self.state.lock().depth -= 1;
        Ok(())
    }

    /// Resets the value to null and notifies all listeners.
    pub fn clear(&self) -> Result<(), ContextUpdateError> {
        self.set(None, Value::Null)
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        GlobalContext::new()
    }
}

impl fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GlobalContext")
            .field("value", &state.data.value)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}
