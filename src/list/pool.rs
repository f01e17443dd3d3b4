use crate::component::TemplateId;
use parking_lot::Mutex;
use perch_core::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Idle cells, partitioned by the template they were cloned from.
///
/// Cloning yields another handle to the same pool; nested lists share their outermost list’s pool.
#[derive(Debug, Clone, Default)]
pub struct RecycledPool {
    cells: Arc<Mutex<HashMap<TemplateId, Vec<NodeId>>>>,
}

impl RecycledPool {
    pub fn new() -> RecycledPool {
        RecycledPool::default()
    }

    pub fn push(&self, template: TemplateId, cell: NodeId) {
        self.cells.lock().entry(template).or_default().push(cell);
    }

    /// Takes the most recently pushed cell of a template.
    pub fn pop(&self, template: TemplateId) -> Option<NodeId> {
        self.cells.lock().get_mut(&template)?.pop()
    }

    /// Number of idle cells of a template.
    pub fn len(&self, template: TemplateId) -> usize {
        self.cells.lock().get(&template).map_or(0, Vec::len)
    }

    pub fn same_as(&self, other: &RecycledPool) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }
}
