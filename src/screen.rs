use crate::action::{ActionHandler, RootContext};
use crate::component::{Action, Component};
use crate::events::ScreenEvent;
use crate::list::{DataChange, ListSnapshot, ListView, ScrollMetrics};
use crate::renderer::{ListChange, Renderer};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use perch_core::{
    find_outermost, Config, ContextData, ContextManager, ContextUpdateError, GlobalContext, NodeId,
    Observer, SetContext, Template, ViewTree,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Work produced by binding observers, applied by [`Screen::flush`].
#[derive(Debug)]
enum Effect {
    Property {
        node: NodeId,
        name: String,
        value: Option<Value>,
    },
    DataSource {
        list: NodeId,
        value: Option<Value>,
    },
}

/// What a node was built from.
#[derive(Debug, Clone)]
struct NodeSpec {
    context: Option<ContextData>,
    properties: Vec<(String, Template)>,
}

/// A rendered component tree: connects the view tree, its contexts and lists to a renderer.
pub struct Screen<R, A> {
    tree: ViewTree,
    manager: ContextManager,
    config: Config,
    specs: HashMap<NodeId, NodeSpec>,
    lists: BTreeMap<NodeId, ListView>,
    /// The list each orphaned cell was last bound in.
    cell_owners: HashMap<NodeId, NodeId>,
    renderer: R,
    actions: A,
    effect_sender: Sender<Effect>,
    effect_recv: Receiver<Effect>,
    event_sender: Sender<ScreenEvent>,
    event_recv: Receiver<ScreenEvent>,
}

impl<R: Renderer, A: ActionHandler> Screen<R, A> {
    /// Builds and renders a component tree.
    ///
    /// All bindings are resolved and their first values delivered before this returns. List
    /// `on_init` actions wait for [`ScreenEvent::Attached`].
    pub fn new(
        root: &Component,
        renderer: R,
        actions: A,
        global: GlobalContext,
        config: Config,
    ) -> Screen<R, A> {
        let (effect_sender, effect_recv) = channel::unbounded();
        let (event_sender, event_recv) = channel::unbounded();

        let mut screen = Screen {
            tree: ViewTree::new(),
            manager: ContextManager::new(global, config.clone()),
            config,
            specs: HashMap::new(),
            lists: BTreeMap::new(),
            cell_owners: HashMap::new(),
            renderer,
            actions,
            effect_sender,
            effect_recv,
            event_sender,
            event_recv,
        };
        screen.mount(root);
        screen
    }

    fn mount(&mut self, root: &Component) {
        let root = match self.build(root, None) {
            Some(root) => root,
            None => return,
        };
        let nodes = self.own_nodes(root);
        for node in &nodes {
            self.add_spec_context(*node);
            self.register_bindings(*node);
        }
        for node in &nodes {
            self.manager.resolve_bindings(&self.tree, *node);
        }
        self.flush();
    }

    /// Creates nodes for a component and its static children. Nothing is bound yet.
    fn build(&mut self, component: &Component, parent: Option<NodeId>) -> Option<NodeId> {
        let node = match parent {
            Some(parent) => self.tree.add_subview(parent)?,
            None => self.tree.create_root().0,
        };
        self.specs.insert(
            node,
            NodeSpec {
                context: component.context.clone(),
                properties: component
                    .properties
                    .iter()
                    .map(|(name, template)| (name.clone(), template.clone()))
                    .collect(),
            },
        );

        match &component.list {
            Some(model) => {
                let view = ListView::new(
                    node,
                    model.clone(),
                    &self.config.default_iterator_name,
                    self.config.initial_window,
                );
                self.lists.insert(node, view);
            }
            None => {
                for child in &component.children {
                    self.build(child, Some(node));
                }
            }
        }
        Some(node)
    }

    fn add_spec_context(&mut self, node: NodeId) {
        let context = self.specs.get(&node).and_then(|spec| spec.context.clone());
        if let Some(context) = context {
            if let Err(err) = self.manager.add_context(node, context) {
                debug!(%node, %err, "component context not applied");
            }
        }
    }

    /// Queues the bindings of a node’s properties and, for lists, of the data source.
    fn register_bindings(&mut self, node: NodeId) {
        if let Some(spec) = self.specs.get(&node) {
            for (name, template) in &spec.properties {
                let effects = self.effect_sender.clone();
                let name = name.clone();
                let observer = Observer::new(move |value| {
                    let effect = Effect::Property {
                        node,
                        name: name.clone(),
                        value: value.cloned(),
                    };
                    if effects.send(effect).is_err() {
                        debug!(%node, "screen is gone; dropping property value");
                    }
                });
                self.manager.add_binding(node, template.clone(), observer);
            }
        }

        if let Some(view) = self.lists.get(&node) {
            let effects = self.effect_sender.clone();
            let observer = Observer::new(move |value| {
                let effect = Effect::DataSource {
                    list: node,
                    value: value.cloned(),
                };
                if effects.send(effect).is_err() {
                    debug!(list = %node, "screen is gone; dropping data source");
                }
            });
            self.manager
                .add_binding(node, view.model().data_source.clone(), observer);
        }
    }

    /// The node and its descendants in pre-order, not descending into lists.
    fn own_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            if !self.lists.contains_key(&node) {
                stack.extend(self.tree.subviews(node).iter().rev());
            }
        }
        nodes
    }

    /// The outermost lists inside a cell.
    pub fn nested_lists(&self, cell: NodeId) -> Vec<NodeId> {
        find_outermost(&self.tree, cell, |node| self.lists.contains_key(&node))
    }

    /// Applies queued context updates and observer effects until there are none left.
    pub fn flush(&mut self) {
        loop {
            if let Err(err) = self.manager.process_pending_updates(&self.tree) {
                debug!(%err, "queued context updates were dropped");
            }
            match self.effect_recv.try_recv() {
                Ok(effect) => self.apply_effect(effect),
                Err(_) => break,
            }
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Property { node, name, value } => {
                self.renderer.apply(node, &name, value.as_ref())
            }
            Effect::DataSource { list, value } => self.apply_data_source(list, value.as_ref()),
        }
    }

    fn apply_data_source(&mut self, list: NodeId, value: Option<&Value>) {
        let change = match self.lists.get_mut(&list) {
            Some(view) => view.accept_data(value),
            None => return,
        };
        match change {
            DataChange::Unchanged => debug!(%list, "data source unchanged"),
            DataChange::Rejected => (),
            DataChange::Cleared { prior, released } => {
                self.recycle(list, released);
                if prior > 0 {
                    self.renderer.list_changed(list, ListChange::Removed(prior));
                }
            }
            DataChange::Replaced { count, released } => {
                self.recycle(list, released);
                self.renderer.list_changed(list, ListChange::Reloaded(count));
                self.fill_window(list);
            }
        }
    }

    /// Returns cells to the pool without remembering their items.
    fn recycle(&mut self, list: NodeId, cells: Vec<NodeId>) {
        let (pool, template) = match self.lists.get(&list) {
            Some(view) => (view.pool().clone(), view.template_id()),
            None => return,
        };
        for cell in cells {
            self.cell_owners.remove(&cell);
            self.release_bindings(cell);
            self.tree.detach(cell);
            pool.push(template, cell);
        }
    }

    /// Detaches the bindings of a cell and everything below it, nested lists included. Contexts
    /// stay so a reused cell can still hand its item context back.
    fn release_bindings(&mut self, cell: NodeId) {
        for node in self.tree.descendants(cell) {
            self.manager.remove_bindings(node);
        }
    }

    /// Binds every item in the list’s window that has no cell yet.
    fn fill_window(&mut self, list: NodeId) {
        let unbound = match self.lists.get(&list) {
            Some(view) => view.unbound_in_window(),
            None => return,
        };
        for index in unbound {
            self.bind_cell(list, index);
        }
    }

    fn bind_cell(&mut self, list: NodeId, index: usize) {
        let (template, template_id, pool, iterator, item) = match self.lists.get(&list) {
            Some(view) => match view.items().get(index) {
                Some(item) => (
                    Arc::clone(&view.model().template),
                    view.template_id(),
                    view.pool().clone(),
                    view.iterator_name().to_owned(),
                    item.clone(),
                ),
                None => return,
            },
            None => return,
        };

        let cell = match pool.pop(template_id) {
            Some(cell) => {
                if let Some(owner) = self.cell_owners.remove(&cell) {
                    let context = self.manager.context(cell);
                    if let Some(owner) = self.lists.get_mut(&owner) {
                        owner.resolver_mut().reuse(cell, context);
                    }
                }
                self.tree.move_node(cell, list);
                cell
            }
            None => match self.instantiate(list, &template) {
                Some(cell) => cell,
                None => return,
            },
        };

        let manager = &self.manager;
        let saved = match self.lists.get_mut(&list) {
            Some(view) => {
                view.insert_cell(index, cell);
                view.resolver_mut()
                    .context_for(index, |orphan| manager.context(orphan))
            }
            None => return,
        };
        let context = saved.unwrap_or_else(|| ContextData::new(iterator, item));
        self.prepare_cell(list, cell, index, context);
    }

    /// Builds a new cell under the list. Lists nested in it share the list’s pool.
    fn instantiate(&mut self, list: NodeId, template: &Component) -> Option<NodeId> {
        let cell = self.build(template, Some(list))?;
        let pool = self.lists.get(&list)?.pool().clone();
        for nested in self.nested_lists(cell) {
            if let Some(view) = self.lists.get_mut(&nested) {
                view.adopt_pool(pool.clone());
            }
        }
        debug!(%list, %cell, "instantiated cell");
        Some(cell)
    }

    /// Gives a cell the context of its item and rebinds everything in it.
    ///
    /// Nested lists get back the state they had for this item, or start over (running their
    /// `on_init`) if the item is shown for the first time.
    fn prepare_cell(&mut self, list: NodeId, cell: NodeId, index: usize, context: ContextData) {
        let nodes = self.own_nodes(cell);
        for node in &nodes {
            self.manager.remove_bindings(*node);
        }
        if let Err(err) = self.manager.add_context(cell, context) {
            debug!(%cell, %err, "item context not applied");
        }
        for node in nodes.iter().skip(1) {
            self.add_spec_context(*node);
        }
        for node in &nodes {
            self.register_bindings(*node);
        }

        let state = self
            .lists
            .get(&list)
            .and_then(|view| view.item_states().get(index))
            .cloned()
            .unwrap_or_default();
        for (position, nested) in self.nested_lists(cell).into_iter().enumerate() {
            match state.nested.get(position).filter(|_| state.initialized) {
                Some(snapshot) => self.restore_list(nested, snapshot.clone()),
                None => {
                    self.reset_list(nested);
                    self.run_init(nested);
                }
            }
        }
        if let Some(state) = self
            .lists
            .get_mut(&list)
            .and_then(|view| view.item_state_mut(index))
        {
            state.initialized = true;
        }

        for node in &nodes {
            self.manager.resolve_bindings(&self.tree, *node);
        }
    }

    /// Takes a cell out of the list, remembering its item’s state.
    fn unbind_cell(&mut self, list: NodeId, index: usize, cell: NodeId) {
        let snapshots: Vec<Value> = self
            .nested_lists(cell)
            .into_iter()
            .map(|nested| self.snapshot_value(nested))
            .collect();

        let (pool, template) = match self.lists.get_mut(&list) {
            Some(view) => {
                if let Some(state) = view.item_state_mut(index) {
                    state.nested = snapshots;
                }
                view.resolver_mut().track_orphan(cell, index);
                (view.pool().clone(), view.template_id())
            }
            None => return,
        };
        self.cell_owners.insert(cell, list);
        self.release_bindings(cell);
        self.tree.detach(cell);
        pool.push(template, cell);
    }

    fn snapshot_list(&self, list: NodeId) -> Option<ListSnapshot> {
        let view = self.lists.get(&list)?;
        let mut item_states = view.item_states().to_vec();
        for (index, cell) in view.cells() {
            let nested: Vec<Value> = self
                .nested_lists(cell)
                .into_iter()
                .map(|nested| self.snapshot_value(nested))
                .collect();
            if let Some(state) = item_states.get_mut(index) {
                state.nested = nested;
            }
        }
        let item_contexts = view
            .resolver()
            .collect(view.cells(), |cell| self.manager.context(cell));

        Some(ListSnapshot {
            context: self.manager.context(list),
            items: view.items().to_vec(),
            item_contexts,
            item_states,
            scroll_end_fired: view.scroll_end_fired(),
        })
    }

    /// A serialized snapshot, or null if there is nothing to keep.
    fn snapshot_value(&self, list: NodeId) -> Value {
        let snapshot = match self.snapshot_list(list) {
            Some(snapshot) => snapshot,
            None => return Value::Null,
        };
        match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(err) => {
                warn!(%list, %err, "could not serialize list snapshot");
                Value::Null
            }
        }
    }

    fn restore_list(&mut self, list: NodeId, snapshot: Value) {
        let snapshot: ListSnapshot = match serde_json::from_value(snapshot) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(%list, %err, "no usable snapshot; starting over");
                self.reset_list(list);
                self.run_init(list);
                return;
            }
        };

        let context = snapshot.context.clone();
        let released = match self.lists.get_mut(&list) {
            Some(view) => view.restore(snapshot),
            None => return,
        };
        self.recycle(list, released);
        if let Some(context) = context {
            if let Err(err) = self.manager.add_context(list, context) {
                debug!(%list, %err, "list context not restored");
            }
        }

        let count = self.lists.get(&list).map_or(0, ListView::len);
        debug!(%list, count, "restored nested list");
        if count > 0 {
            self.renderer.list_changed(list, ListChange::Reloaded(count));
        }
        self.fill_window(list);
    }

    fn reset_list(&mut self, list: NodeId) {
        let (prior, released) = match self.lists.get_mut(&list) {
            Some(view) => view.reset(),
            None => return,
        };
        self.recycle(list, released);
        if prior > 0 {
            self.renderer.list_changed(list, ListChange::Removed(prior));
        }
    }

    fn run_init(&mut self, list: NodeId) {
        let actions = match self.lists.get_mut(&list) {
            Some(view) => {
                view.mark_init();
                view.model().on_init.clone()
            }
            None => return,
        };
        debug!(%list, "running on_init");
        self.run_actions(list, &actions);
    }

    fn check_scroll_end(&mut self, list: NodeId) {
        let actions = match self.lists.get_mut(&list) {
            Some(view) => {
                if !view.take_scroll_end() {
                    return;
                }
                view.model().on_scroll_end.clone()
            }
            None => return,
        };
        debug!(%list, "scroll reached the end");
        self.run_actions(list, &actions);
    }

    fn run_actions(&mut self, origin: NodeId, actions: &[Action]) {
        if actions.is_empty() {
            return;
        }
        let root = RootContext::new(self.manager.updater(), self.manager.global().clone());
        self.actions.execute(&root, origin, actions);
    }

    /// Returns a sender for host events. They are handled by [`poll`](Self::poll).
    pub fn event_sender(&self) -> Sender<ScreenEvent> {
        self.event_sender.clone()
    }

    /// Receives all events from the event queue and updates the screen accordingly.
    ///
    /// Also picks up values from elsewhere, such as global context changes made by other screens.
    pub fn poll(&mut self) {
        loop {
            match self.event_recv.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.flush();
    }

    /// Handles a single host event.
    pub fn handle_event(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::Attached(node) => {
                let first = match self.lists.get_mut(&node) {
                    Some(view) => {
                        view.set_attached(true);
                        !view.init_done()
                    }
                    None => false,
                };
                if first {
                    self.run_init(node);
                }
            }
            ScreenEvent::Detached(node) => {
                if let Some(view) = self.lists.get_mut(&node) {
                    view.set_attached(false);
                }
            }
            ScreenEvent::VisibleRange { list, range } => {
                let leaving = match self.lists.get_mut(&list) {
                    Some(view) => view.set_window(range),
                    None => Vec::new(),
                };
                for (index, cell) in leaving {
                    self.unbind_cell(list, index, cell);
                }
                self.fill_window(list);
            }
            ScreenEvent::Scroll {
                list,
                viewport,
                content,
            } => {
                if let Some(view) = self.lists.get_mut(&list) {
                    view.set_metrics(ScrollMetrics::new(viewport, content));
                }
                self.check_scroll_end(list);
            }
            ScreenEvent::Frame => {
                let lists: Vec<NodeId> = self.lists.keys().copied().collect();
                for list in lists {
                    self.check_scroll_end(list);
                }
            }
        }
        self.flush();
    }

    /// Updates a context on behalf of `node` and applies the consequences.
    pub fn update_context(
        &mut self,
        node: NodeId,
        update: SetContext,
    ) -> Result<(), ContextUpdateError> {
        let result = self.manager.update_context(&self.tree, node, update);
        self.flush();
        result
    }

    /// Evaluates a template at a node.
    pub fn evaluate(&self, node: NodeId, template: &Template) -> Option<Value> {
        self.manager.evaluate(&self.tree, node, template)
    }

    /// The context a node owns.
    pub fn context(&self, node: NodeId) -> Option<ContextData> {
        self.manager.context(node)
    }

    /// Tears everything down. The screen renders nothing afterwards.
    pub fn unmount(&mut self) {
        self.manager.clear_contexts();
        self.lists.clear();
        self.specs.clear();
        self.cell_owners.clear();
        self.tree = ViewTree::new();
        while self.effect_recv.try_recv().is_ok() {}
    }

    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn list(&self, node: NodeId) -> Option<&ListView> {
        self.lists.get(&node)
    }

    /// All list nodes, including those inside cells.
    pub fn list_nodes(&self) -> Vec<NodeId> {
        self.lists.keys().copied().collect()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut A {
        &mut self.actions
    }
}
