use super::pool::RecycledPool;
use super::resolver::ItemContextResolver;
use super::scroll::ScrollMetrics;
use crate::component::{ListModel, TemplateId};
use perch_core::{kind_of, ContextData, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::mem;
use std::ops::Range;
use tracing::warn;

/// What a list remembers about one of its items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    /// Whether a cell has been bound to this item since the items were last replaced.
    pub initialized: bool,

    /// Serialized [`ListSnapshot`]s of the lists nested in this item’s cell, in scan order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Value>,
}

/// Everything needed to bring a nested list back to how it was for one outer item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshot {
    /// The list’s own context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextData>,
    pub items: Vec<Value>,
    #[serde(default)]
    pub item_contexts: BTreeMap<usize, ContextData>,
    #[serde(default)]
    pub item_states: Vec<ItemState>,
    #[serde(default)]
    pub scroll_end_fired: bool,
}

/// Outcome of a data source notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DataChange {
    /// Same items as before; nothing happened.
    Unchanged,
    /// Not an array; the current items were kept.
    Rejected,
    /// The list is now empty. `released` cells must go back to the pool.
    Cleared { prior: usize, released: Vec<NodeId> },
    /// The items were replaced. `released` cells must go back to the pool.
    Replaced { count: usize, released: Vec<NodeId> },
}

/// The state of one virtualized list.
#[derive(Debug)]
pub struct ListView {
    node: NodeId,
    model: ListModel,
    iterator_name: String,
    pool: RecycledPool,
    items: Vec<Value>,
    loaded: bool,
    item_states: Vec<ItemState>,
    resolver: ItemContextResolver,
    /// Bound cells by item index.
    cells: BTreeMap<usize, NodeId>,
    window: Range<usize>,
    metrics: Option<ScrollMetrics>,
    scroll_end_fired: bool,
    init_done: bool,
    attached: bool,
}

impl ListView {
    pub fn new(node: NodeId, model: ListModel, default_iterator: &str, window: usize) -> ListView {
        let iterator_name = model
            .iterator_name
            .clone()
            .unwrap_or_else(|| default_iterator.to_owned());
        ListView {
            node,
            model,
            iterator_name,
            pool: RecycledPool::new(),
            items: Vec::new(),
            loaded: false,
            item_states: Vec::new(),
            resolver: ItemContextResolver::new(),
            cells: BTreeMap::new(),
            window: 0..window,
            metrics: None,
            scroll_end_fired: false,
            init_done: false,
            attached: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn model(&self) -> &ListModel {
        &self.model
    }

    /// Whether the host should drive this list from its parent’s scroll view.
    pub fn uses_parent_scroll(&self) -> bool {
        self.model.use_parent_scroll
    }

    pub fn template_id(&self) -> TemplateId {
        self.model.template_id
    }

    pub fn iterator_name(&self) -> &str {
        &self.iterator_name
    }

    pub fn pool(&self) -> &RecycledPool {
        &self.pool
    }

    /// Makes this list take and return cells through another pool.
    pub fn adopt_pool(&mut self, pool: RecycledPool) {
        self.pool = pool;
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn resolver(&self) -> &ItemContextResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ItemContextResolver {
        &mut self.resolver
    }

    pub fn item_states(&self) -> &[ItemState] {
        &self.item_states
    }

    pub fn item_state_mut(&mut self, index: usize) -> Option<&mut ItemState> {
        self.item_states.get_mut(index)
    }

    /// The cell bound to an item.
    pub fn cell_at(&self, index: usize) -> Option<NodeId> {
        self.cells.get(&index).copied()
    }

    /// Bound cells in item order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.cells.iter().map(|(index, cell)| (*index, *cell))
    }

    pub(crate) fn insert_cell(&mut self, index: usize, cell: NodeId) {
        self.cells.insert(index, cell);
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    pub fn scroll_end_fired(&self) -> bool {
        self.scroll_end_fired
    }

    pub fn init_done(&self) -> bool {
        self.init_done
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    /// Records that `on_init` ran. Returns true the first time.
    pub(crate) fn mark_init(&mut self) -> bool {
        !mem::replace(&mut self.init_done, true)
    }

    /// Applies a data source value.
    ///
    /// Values equal to the current items are ignored. Anything else resets all per-item state,
    /// including the scroll geometry measured against the previous items.
    pub(crate) fn accept_data(&mut self, value: Option<&Value>) -> DataChange {
        let items = match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                warn!(list = %self.node, found = kind_of(other), "data source is not an array; keeping the current items");
                return DataChange::Rejected;
            }
        };
        if self.loaded && items == self.items {
            return DataChange::Unchanged;
        }

        let released = self.release_cells();
        self.resolver.reset();
        self.scroll_end_fired = false;
        self.metrics = None;
        self.loaded = true;
        self.item_states = vec![ItemState::default(); items.len()];
        let prior = mem::replace(&mut self.items, items);

        if self.items.is_empty() {
            DataChange::Cleared {
                prior: prior.len(),
                released,
            }
        } else {
            DataChange::Replaced {
                count: self.items.len(),
                released,
            }
        }
    }

    /// Empties the list entirely, including the record of which items were loaded.
    ///
    /// Returns the previous item count and the cells to return to the pool.
    pub(crate) fn reset(&mut self) -> (usize, Vec<NodeId>) {
        let released = self.release_cells();
        self.resolver.reset();
        self.scroll_end_fired = false;
        self.metrics = None;
        self.loaded = false;
        self.item_states.clear();
        let prior = mem::take(&mut self.items);
        (prior.len(), released)
    }

    /// Takes over the state of a snapshot. Returns the cells to return to the pool.
    pub(crate) fn restore(&mut self, snapshot: ListSnapshot) -> Vec<NodeId> {
        let released = self.release_cells();
        let mut states = snapshot.item_states;
        states.resize(snapshot.items.len(), ItemState::default());
        self.item_states = states;
        self.items = snapshot.items;
        self.loaded = true;
        self.resolver.restore(snapshot.item_contexts);
        self.scroll_end_fired = snapshot.scroll_end_fired;
        self.metrics = None;
        released
    }

    fn release_cells(&mut self) -> Vec<NodeId> {
        mem::take(&mut self.cells).into_iter().map(|(_, cell)| cell).collect()
    }

    /// Moves the visible window. Returns the bound cells that left it.
    pub(crate) fn set_window(&mut self, window: Range<usize>) -> Vec<(usize, NodeId)> {
        self.window = window;
        let leaving: Vec<usize> = self
            .cells
            .keys()
            .copied()
            .filter(|index| !self.window.contains(index))
            .collect();
        leaving
            .into_iter()
            .filter_map(|index| self.cells.remove(&index).map(|cell| (index, cell)))
            .collect()
    }

    /// Item indices inside the window that have no cell.
    pub fn unbound_in_window(&self) -> Vec<usize> {
        let end = self.window.end.min(self.items.len());
        (self.window.start..end)
            .filter(|index| !self.cells.contains_key(index))
            .collect()
    }

    pub(crate) fn set_metrics(&mut self, metrics: ScrollMetrics) {
        self.metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<ScrollMetrics> {
        self.metrics
    }

    /// Whether `on_scroll_end` should run now. Returns true at most once per data source.
    pub(crate) fn take_scroll_end(&mut self) -> bool {
        if self.scroll_end_fired {
            return false;
        }
        let reached = match self.metrics {
            Some(metrics) => metrics.reached(self.model.direction, self.model.scroll_threshold),
            None => false,
        };
        if reached {
            self.scroll_end_fired = true;
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::rect::Rect;
    use cgmath::{Point2, Vector2};
    use perch_core::{NodeArena, Template};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn list(threshold: Option<f64>) -> ListView {
        let model = ListModel::new(Template::parse("@{page.items}").unwrap(), Component::new())
            .with_on_scroll_end(vec![json!("load")], threshold);
        let node = NodeArena::new().allocate();
        ListView::new(node, model, "item", 2)
    }

    #[test]
    fn data_source_changes() {
        let mut list = list(None);
        assert_eq!(
            list.accept_data(Some(&json!(["a", "b"]))),
            DataChange::Replaced { count: 2, released: vec![] }
        );
        assert_eq!(list.accept_data(Some(&json!(["a", "b"]))), DataChange::Unchanged);
        assert_eq!(list.accept_data(Some(&json!({"a": 1}))), DataChange::Rejected);
        assert_eq!(list.items(), &[json!("a"), json!("b")]);

        let mut arena = NodeArena::new();
        let cell = arena.allocate();
        list.insert_cell(0, cell);
        assert_eq!(
            list.accept_data(Some(&json!([]))),
            DataChange::Cleared { prior: 2, released: vec![cell] }
        );
        assert!(list.is_empty());
        assert_eq!(list.accept_data(None), DataChange::Unchanged);
    }

    #[test]
    fn window_moves_release_cells() {
        let mut list = list(None);
        list.accept_data(Some(&json!([1, 2, 3, 4])));
        assert_eq!(list.unbound_in_window(), vec![0, 1]);

        let mut arena = NodeArena::new();
        let (a, b) = (arena.allocate(), arena.allocate());
        list.insert_cell(0, a);
        list.insert_cell(1, b);
        assert_eq!(list.set_window(1..10), vec![(0, a)]);
        assert_eq!(list.unbound_in_window(), vec![2, 3]);
        assert_eq!(list.cell_at(1), Some(b));
    }

    #[test]
    fn scroll_end_fires_once_per_data_source() {
        let mut list = list(Some(80.));
        list.accept_data(Some(&json!([1, 2, 3])));
        let metrics = |offset| {
            ScrollMetrics::new(
                Rect::new(Point2::new(0., offset), Vector2::new(100., 50.)),
                Vector2::new(100., 200.),
            )
        };

        list.set_metrics(metrics(100.));
        assert!(!list.take_scroll_end());
        list.set_metrics(metrics(110.));
        assert!(list.take_scroll_end());
        list.set_metrics(metrics(150.));
        assert!(!list.take_scroll_end());

        list.accept_data(Some(&json!([1, 2, 3, 4])));
        assert_eq!(list.metrics(), None);
        assert!(!list.take_scroll_end(), "old geometry must not count for new items");
        list.set_metrics(metrics(150.));
        assert!(list.take_scroll_end());
    }

    #[test]
    fn snapshots_survive_serialization() {
        let snapshot = ListSnapshot {
            context: Some(ContextData::new("tabs", json!({"selected": 1}))),
            items: vec![json!("x"), json!("y")],
            item_contexts: vec![(1, ContextData::new("tag", json!("y!")))].into_iter().collect(),
            item_states: vec![ItemState { initialized: true, nested: vec![] }],
            scroll_end_fired: true,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        let back: ListSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);

        let mut list = list(None);
        list.restore(back);
        assert_eq!(list.len(), 2);
        assert_eq!(list.item_states().len(), 2);
        assert!(list.scroll_end_fired());
        assert_eq!(list.accept_data(Some(&json!(["x", "y"]))), DataChange::Unchanged);
    }
}
