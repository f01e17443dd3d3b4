//! Per-item contexts of a list.

use perch_core::{ContextData, NodeId};
use std::collections::{BTreeMap, HashMap};

/// Remembers the context of every item a list has shown, so that revisiting an item restores
/// whatever its subtree changed instead of starting over from the raw item data.
///
/// Contexts are captured lazily: unbinding a cell only marks it as an orphan of its item, and the
/// cell’s context is read when the cell is reused or its item is bound again.
#[derive(Debug, Clone, Default)]
pub struct ItemContextResolver {
    contexts: BTreeMap<usize, ContextData>,
    orphans: HashMap<NodeId, usize>,
}

impl ItemContextResolver {
    pub fn new() -> ItemContextResolver {
        ItemContextResolver::default()
    }

    /// Records that `cell` stopped showing item `index`.
    pub fn track_orphan(&mut self, cell: NodeId, index: usize) {
        self.orphans.insert(cell, index);
    }

    pub fn is_orphan(&self, cell: NodeId) -> bool {
        self.orphans.contains_key(&cell)
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// `cell` is about to show something else; keeps its `context` for the item it last showed.
    pub fn reuse(&mut self, cell: NodeId, context: Option<ContextData>) {
        if let Some(index) = self.orphans.remove(&cell) {
            if let Some(context) = context {
                self.contexts.insert(index, context);
            }
        }
    }

    /// The saved context of item `index`, if it has one.
    ///
    /// If an orphan cell still holds the item’s context, it is captured first through `lookup`.
    pub fn context_for<F>(&mut self, index: usize, mut lookup: F) -> Option<ContextData>
    where
        F: FnMut(NodeId) -> Option<ContextData>,
    {
        let orphan = self
            .orphans
            .iter()
            .find(|(_, item)| **item == index)
            .map(|(cell, _)| *cell);
        if let Some(cell) = orphan {
            let context = lookup(cell);
            self.reuse(cell, context);
        }
        self.contexts.get(&index).cloned()
    }

    /// Every known item context: saved ones, orphans’, and those of the currently `bound` cells.
    pub fn collect<I, F>(&self, bound: I, mut lookup: F) -> BTreeMap<usize, ContextData>
    where
        I: IntoIterator<Item = (usize, NodeId)>,
        F: FnMut(NodeId) -> Option<ContextData>,
    {
        let mut contexts = self.contexts.clone();
        let live = self
            .orphans
            .iter()
            .map(|(cell, index)| (*index, *cell))
            .chain(bound);
        for (index, cell) in live {
            if let Some(context) = lookup(cell) {
                contexts.insert(index, context);
            }
        }
        contexts
    }

    /// Replaces all state with previously collected contexts.
    pub fn restore(&mut self, contexts: BTreeMap<usize, ContextData>) {
        self.orphans.clear();
        self.contexts = contexts;
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.orphans.clear();
        self.contexts.clear();
    }
}
