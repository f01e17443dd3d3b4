//! Bindings: one observed property depending on one template.

use crate::context::ContextBinding;
use crate::expression::{ExpressionKind, Template};
use crate::node::NodeId;
use core::fmt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Receives the evaluated value of a binding. `None` means the value is absent.
pub struct Observer(Arc<Mutex<dyn FnMut(Option<&Value>) + Send>>);

impl Clone for Observer {
    fn clone(&self) -> Self {
        Observer(Arc::clone(&self.0))
    }
}

impl Observer {
    pub fn new<F: 'static + FnMut(Option<&Value>) + Send>(observer: F) -> Self {
        Observer(Arc::new(Mutex::new(observer)))
    }

    /// Delivers a value.
    ///
    /// An observer that is already running (its own notification caused a cycle back to it) is
    /// skipped rather than re-entered.
    pub fn notify(&self, value: Option<&Value>) {
        match self.0.try_lock() {
            Some(mut observer) => (&mut *observer)(value),
            None => warn!("observer re-entered by its own update; skipping"),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Observer(..)")
    }
}

/// Lifecycle of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Queued; not yet attached to any context.
    Pending,
    /// Attached to its contexts and holding a current value.
    Resolved,
}

#[derive(Debug)]
pub struct Binding {
    template: Template,
    observer: Observer,
    state: BindingState,
    /// Last value of every context expression, keyed by expression source.
    evaluated: HashMap<String, Option<Value>>,
    /// Context version last delivered to the observer, keyed by context id.
    seen: HashMap<String, u64>,
}

impl Binding {
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub(crate) fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Re-evaluates the expressions that refer to `context` and stores their values.
    ///
    /// Returns true if the template references the context at all.
    pub(crate) fn absorb(&mut self, context: &mut ContextBinding) -> bool {
        let mut referenced = false;
        for expression in self.template.expressions() {
            if let ExpressionKind::Context { id, path } = expression.kind() {
                if id == context.id() {
                    referenced = true;
                    let value = context.lookup(path);
                    self.evaluated.insert(expression.source().to_owned(), value);
                }
            }
        }
        if referenced {
            self.seen.insert(context.id().to_owned(), context.version());
        }
        referenced
    }

    /// Re-evaluates against a changed context.
    ///
    /// Returns the value to deliver, or None if this binding has already seen this version of the
    /// context.
    pub(crate) fn refresh(&mut self, context: &mut ContextBinding) -> Option<Option<Value>> {
        if self.seen.get(context.id()) == Some(&context.version()) {
            return None;
        }
        self.reevaluate(context)
    }

    /// Re-evaluates against `context` whether or not this version was already delivered.
    ///
    /// Returns None only if the template does not reference the context.
    pub(crate) fn reevaluate(&mut self, context: &mut ContextBinding) -> Option<Option<Value>> {
        if !self.absorb(context) {
            return None;
        }
        self.state = BindingState::Resolved;
        Some(self.current_value())
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.state = BindingState::Resolved;
    }

    /// Assembles the template from the last known expression values.
    pub fn current_value(&self) -> Option<Value> {
        self.template.evaluate_with(|expression| match expression.kind() {
            ExpressionKind::Literal(value) => Some(value.clone()),
            ExpressionKind::Context { .. } => self
                .evaluated
                .get(expression.source())
                .cloned()
                .flatten(),
        })
    }
}

/// A shared handle to a binding, tagged with the node that owns it.
#[derive(Debug, Clone)]
pub struct BindingHandle {
    owner: NodeId,
    inner: Arc<Mutex<Binding>>,
}

impl BindingHandle {
    pub fn new(owner: NodeId, template: Template, observer: Observer) -> BindingHandle {
        BindingHandle {
            owner,
            inner: Arc::new(Mutex::new(Binding {
                template,
                observer,
                state: BindingState::Pending,
                evaluated: HashMap::new(),
                seen: HashMap::new(),
            })),
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, Binding> {
        self.inner.lock()
    }

    pub fn state(&self) -> BindingState {
        self.inner.lock().state()
    }

    pub fn same_as(&self, other: &BindingHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
