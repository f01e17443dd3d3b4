//! The context manager: which node owns which context, and who depends on it.

use crate::binding::{BindingHandle, Observer};
use crate::config::Config;
use crate::context::{ContextBinding, ContextData, SharedContext, GLOBAL_CONTEXT_ID};
use crate::error::ContextUpdateError;
use crate::expression::{ExpressionKind, Template};
use crate::global::{GlobalContext, SubscriptionId};
use crate::node::NodeId;
use crate::path::Path;
use crate::view_tree::ViewTree;
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An instruction to place a value inside a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetContext {
    /// Id of the target context; resolved against the ancestor chain of the issuing node.
    pub context_id: String,
    /// Path inside the context value. `None`, `""` and `"."` replace the whole value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub value: Value,
}

impl SetContext {
    pub fn new(context_id: impl Into<String>, value: Value) -> SetContext {
        SetContext {
            context_id: context_id.into(),
            path: None,
            value,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> SetContext {
        self.path = Some(path.into());
        self
    }

    fn parsed_path(&self) -> Result<Option<Path>, ContextUpdateError> {
        match &self.path {
            Some(path) => Ok(Some(Path::parse(path)?)),
            None => Ok(None),
        }
    }
}

/// Queues context updates from places that cannot borrow the manager, such as observers.
///
/// Queued updates are applied by [`ContextManager::update_context`] before it returns, or by
/// [`ContextManager::process_pending_updates`].
#[derive(Debug, Clone)]
pub struct ContextUpdater {
    sender: Sender<(NodeId, SetContext)>,
}

impl ContextUpdater {
    pub fn set(&self, node: NodeId, update: SetContext) {
        if self.sender.send((node, update)).is_err() {
            debug!(%node, "context manager is gone; dropping update");
        }
    }
}

/// Maintains the contexts of a view tree and propagates their changes.
#[derive(Debug)]
pub struct ContextManager {
    config: Config,
    global: GlobalContext,
    global_binding: SharedContext,
    subscription: Option<SubscriptionId>,
    contexts: HashMap<NodeId, SharedContext>,
    pending: HashMap<NodeId, Vec<BindingHandle>>,
    update_sender: Sender<(NodeId, SetContext)>,
    update_receiver: Receiver<(NodeId, SetContext)>,
}

impl ContextManager {
    /// Creates a manager observing the given global context.
    pub fn new(global: GlobalContext, config: Config) -> ContextManager {
        let global_binding = ContextBinding::shared(global.get());
        let relay = Arc::clone(&global_binding);
        let subscription = global.subscribe(move |data| {
            relay.lock().replace(data.clone());
            propagate(&relay, false);
        });
        let (update_sender, update_receiver) = channel::unbounded();

        ContextManager {
            config,
            global,
            global_binding,
            subscription: Some(subscription),
            contexts: HashMap::new(),
            pending: HashMap::new(),
            update_sender,
            update_receiver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn global(&self) -> &GlobalContext {
        &self.global
    }

    /// A handle for queueing updates.
    pub fn updater(&self) -> ContextUpdater {
        ContextUpdater {
            sender: self.update_sender.clone(),
        }
    }

    /// Gives a node its own context, or replaces the one it has.
    ///
    /// Replacing drops every dependent binding of the old context; their owners must register
    /// them again. The reserved global id is rejected.
    pub fn add_context(&mut self, node: NodeId, context: ContextData) -> Result<(), ContextUpdateError> {
        if context.id == GLOBAL_CONTEXT_ID {
            warn!(%node, id = %context.id, "context id is reserved for the global context");
            return Err(ContextUpdateError::ReservedId(context.id));
        }

        match self.contexts.get(&node) {
            Some(existing) => {
                let mut existing = existing.lock();
                existing.replace(context);
                existing.clear_bindings();
            }
            None => {
                self.contexts.insert(node, ContextBinding::shared(context));
            }
        }
        Ok(())
    }

    /// The context a node owns, if any.
    pub fn context(&self, node: NodeId) -> Option<ContextData> {
        self.contexts
            .get(&node)
            .map(|context| context.lock().context().clone())
    }

    pub fn has_context(&self, node: NodeId) -> bool {
        self.contexts.contains_key(&node)
    }

    /// Number of bindings depending on the node’s own context.
    pub fn dependents(&self, node: NodeId) -> usize {
        self.contexts
            .get(&node)
            .map_or(0, |context| context.lock().bindings().len())
    }

    /// Number of bindings depending on the global context.
    pub fn global_dependents(&self) -> usize {
        self.global_binding.lock().bindings().len()
    }

    /// Queues a binding; nothing is evaluated until [`resolve_bindings`](Self::resolve_bindings).
    pub fn add_binding(&mut self, node: NodeId, template: Template, observer: Observer) -> BindingHandle {
        let binding = BindingHandle::new(node, template, observer);
        self.pending.entry(node).or_default().push(binding.clone());
        binding
    }

    pub fn has_pending(&self, node: NodeId) -> bool {
        self.pending.get(&node).map_or(false, |queue| !queue.is_empty())
    }

    /// The context chain of a node: its own and its ancestors’ contexts nearest first, then global.
    fn chain(&self, tree: &ViewTree, node: NodeId) -> Vec<SharedContext> {
        let mut chain: Vec<SharedContext> = tree
            .ancestors(node)
            .filter_map(|ancestor| self.contexts.get(&ancestor).cloned())
            .collect();
        chain.push(Arc::clone(&self.global_binding));
        chain
    }

    /// Resolves the node’s queued bindings against its context chain.
    ///
    /// Every binding is attached to the nearest context of each id it references, evaluated, and
    /// delivered once. The queue entry is consumed. Afterwards the dependents of the node’s own
    /// context are brought up to date.
    pub fn resolve_bindings(&mut self, tree: &ViewTree, node: NodeId) {
        if let Some(queued) = self.pending.remove(&node) {
            let chain = self.chain(tree, node);
            let mut deliveries = Vec::new();

            for binding in queued {
                let mut inner = binding.lock();
                let ids: Vec<String> = inner
                    .template()
                    .context_ids()
                    .into_iter()
                    .map(str::to_owned)
                    .collect();

                let mut matched = false;
                for id in &ids {
                    match chain.iter().find(|context| context.lock().id() == id) {
                        Some(context) => {
                            let mut context = context.lock();
                            context.attach(&binding);
                            inner.absorb(&mut context);
                            matched = true;
                        }
                        None => debug!(%node, context = %id, "expression references an unknown context"),
                    }
                }

                if matched || ids.is_empty() {
                    inner.mark_resolved();
                    deliveries.push((inner.observer().clone(), inner.current_value()));
                }
            }

            for (observer, value) in deliveries {
                observer.notify(value.as_ref());
            }
        }

        if let Some(own) = self.contexts.get(&node).cloned() {
            propagate(&own, false);
        }
    }

    /// Places a value inside the nearest context with the given id (or the global context) and
    /// propagates the change, along with any updates the propagation queued.
    ///
    /// On error nothing was changed by this update.
    pub fn update_context(
        &mut self,
        tree: &ViewTree,
        node: NodeId,
        update: SetContext,
    ) -> Result<(), ContextUpdateError> {
        let result = self.apply_update(tree, node, &update);
        if let Err(err) = &result {
            debug!(%node, context = %update.context_id, %err, "context update failed");
        }
        let cascade = self.process_pending_updates(tree);
        result.and(cascade)
    }

    /// Applies queued updates until the queue is empty.
    pub fn process_pending_updates(&mut self, tree: &ViewTree) -> Result<(), ContextUpdateError> {
        let limit = self.config.max_cascade_updates;
        let mut applied = 0;
        while let Ok((node, update)) = self.update_receiver.try_recv() {
            if applied >= limit {
                let dropped = 1 + self.update_receiver.try_iter().count();
                warn!(limit, dropped, "cascading context updates exceeded the limit");
                return Err(ContextUpdateError::CascadeLimit(limit));
            }
            applied += 1;
            if let Err(err) = self.apply_update(tree, node, &update) {
                debug!(%node, context = %update.context_id, %err, "queued context update failed");
            }
        }
        Ok(())
    }

    fn apply_update(
        &mut self,
        tree: &ViewTree,
        node: NodeId,
        update: &SetContext,
    ) -> Result<(), ContextUpdateError> {
        let path = update.parsed_path()?;

        if update.context_id == GLOBAL_CONTEXT_ID {
            return self.global.set(path.as_ref(), update.value.clone());
        }

        let target = tree
            .ancestors(node)
            .filter_map(|ancestor| self.contexts.get(&ancestor))
            .find(|context| context.lock().id() == update.context_id)
            .cloned()
            .ok_or_else(|| ContextUpdateError::NotFound(update.context_id.clone()))?;

        {
            let mut target = target.lock();
            let path = path.unwrap_or_else(Path::root);
            let context = target.context().with_value_at(&path, update.value.clone())?;
            target.replace(context);
        }
        propagate(&target, false);
        Ok(())
    }

    /// Re-evaluates every dependent of the node’s own context and notifies each of them, even
    /// those that already saw its current value.
    ///
    /// Returns how many observers were notified.
    pub fn notify_binding_changes(&self, node: NodeId) -> usize {
        match self.contexts.get(&node) {
            Some(context) => propagate(context, true),
            None => 0,
        }
    }

    /// Re-evaluates and notifies the dependents of every context, global included.
    pub fn evaluate_contexts(&self) -> usize {
        let mut notified = 0;
        for context in self.contexts.values() {
            notified += propagate(context, true);
        }
        notified + propagate(&self.global_binding, true)
    }

    /// Evaluates a template at a node without registering anything.
    pub fn evaluate(&self, tree: &ViewTree, node: NodeId, template: &Template) -> Option<Value> {
        self.evaluate_with_implicit(tree, node, template, &[])
    }

    /// Evaluates a template at a node, consulting `implicit` contexts before the node’s chain.
    pub fn evaluate_with_implicit(
        &self,
        tree: &ViewTree,
        node: NodeId,
        template: &Template,
        implicit: &[ContextData],
    ) -> Option<Value> {
        let chain = self.chain(tree, node);
        template.evaluate_with(|expression| match expression.kind() {
            ExpressionKind::Literal(value) => Some(value.clone()),
            ExpressionKind::Context { id, path } => {
                if let Some(context) = implicit.iter().find(|context| &context.id == id) {
                    return path.get(&context.value).cloned();
                }
                chain
                    .iter()
                    .find(|context| context.lock().id() == id)
                    .and_then(|context| context.lock().lookup(path))
            }
        })
    }

    /// The contexts in the node’s chain that the template refers to, nearest first.
    pub fn contexts_for_bind(&self, tree: &ViewTree, node: NodeId, template: &Template) -> Vec<ContextData> {
        let ids = template.context_ids();
        self.chain(tree, node)
            .iter()
            .map(|context| context.lock().context().clone())
            .filter(|context| ids.contains(&context.id.as_str()))
            .collect()
    }

    /// Detaches every binding the node owns, queued or resolved.
    pub fn remove_bindings(&mut self, node: NodeId) {
        self.pending.remove(&node);
        for context in self.contexts.values() {
            context.lock().remove_bindings_of(node);
        }
        self.global_binding.lock().remove_bindings_of(node);
    }

    /// Forgets the node’s context and every binding it owns.
    pub fn clear_context(&mut self, node: NodeId) {
        self.contexts.remove(&node);
        self.remove_bindings(node);
    }

    /// Forgets all contexts and bindings. The global context stays observed.
    pub fn clear_contexts(&mut self) {
        self.contexts.clear();
        self.pending.clear();
        self.global_binding.lock().clear_bindings();
        while self.update_receiver.try_recv().is_ok() {}
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.global.unsubscribe(subscription);
        }
    }
}

/// Re-evaluates the dependents of a context, then notifies them in registration order. Unless
/// `force` is set, dependents that already saw the current version are skipped. Returns how many
/// were notified.
fn propagate(context: &SharedContext, force: bool) -> usize {
    let bindings = context.lock().bindings().to_vec();
    let mut deliveries = Vec::new();
    for binding in &bindings {
        let mut inner = binding.lock();
        let mut context = context.lock();
        let value = if force {
            inner.reevaluate(&mut context)
        } else {
            inner.refresh(&mut context)
        };
        if let Some(value) = value {
            deliveries.push((inner.observer().clone(), value));
        }
    }

    let notified = deliveries.len();
    for (observer, value) in deliveries {
        observer.notify(value.as_ref());
    }
    notified
}
