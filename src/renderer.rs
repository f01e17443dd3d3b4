//! Traits for renderers.

use perch_core::NodeId;
use serde_json::Value;

/// A change to the item collection of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// All items were removed; carries the previous item count.
    Removed(usize),
    /// The items were replaced wholesale; carries the new item count.
    Reloaded(usize),
}

/// Applies bound values to native views.
pub trait Renderer {
    /// Sets a property of a node. `None` means the bound value is absent.
    fn apply(&mut self, node: NodeId, property: &str, value: Option<&Value>);

    /// Notifies the renderer that a list must be laid out again.
    fn list_changed(&mut self, list: NodeId, change: ListChange);
}
