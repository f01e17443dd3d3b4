use crate::node::{NodeArena, NodeId};
use std::collections::HashMap;

/// A node in the view tree.
#[derive(Debug)]
struct TreeNode {
    /// The immediate superview.
    superview: Option<NodeId>,
    /// An ordered list of all subviews.
    subviews: Vec<NodeId>,
}

/// A view tree; contains the hierarchy of rendered nodes.
///
/// The tree only tracks structure. Contexts and bindings live in a
/// [`ContextManager`](crate::ContextManager) and are keyed by the [`NodeId`]s issued here.
#[derive(Debug, Default)]
pub struct ViewTree {
    arena: NodeArena,
    nodes: HashMap<NodeId, TreeNode>,
    root: Option<NodeId>,
}

impl ViewTree {
    pub fn new() -> ViewTree {
        ViewTree::default()
    }

    /// The root node, if one has been created.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Creates the root node, replacing (and removing) any existing root.
    ///
    /// Returns the new root and the ids of all removed nodes.
    pub fn create_root(&mut self) -> (NodeId, Vec<NodeId>) {
        let removed = match self.root {
            Some(root) => self.remove(root),
            None => Vec::new(),
        };
        let id = self.arena.allocate();
        self.nodes.insert(
            id,
            TreeNode {
                superview: None,
                subviews: Vec::new(),
            },
        );
        self.root = Some(id);
        (id, removed)
    }

    /// Creates a node as the last subview of `superview`.
    ///
    /// Returns None if the superview does not exist.
    pub fn add_subview(&mut self, superview: NodeId) -> Option<NodeId> {
        if !self.nodes.contains_key(&superview) {
            return None;
        }
        let id = self.arena.allocate();
        self.nodes.insert(
            id,
            TreeNode {
                superview: Some(superview),
                subviews: Vec::new(),
            },
        );
        self.nodes.get_mut(&superview)?.subviews.push(id);
        Some(id)
    }

    /// Creates a node with no superview.
    ///
    /// Detached nodes are used for subtrees that are built before they are placed (e.g. recycled
    /// cells); use [`move_node`](Self::move_node) to attach them.
    pub fn add_detached(&mut self) -> NodeId {
        let id = self.arena.allocate();
        self.nodes.insert(
            id,
            TreeNode {
                superview: None,
                subviews: Vec::new(),
            },
        );
        id
    }

    /// Moves a node (with its subtree) to be the last subview of `superview`.
    ///
    /// Returns false if either node does not exist or if the move would create a cycle.
    pub fn move_node(&mut self, id: NodeId, superview: NodeId) -> bool {
        if !self.nodes.contains_key(&id) || !self.nodes.contains_key(&superview) {
            return false;
        }
        if self.ancestors(superview).any(|ancestor| ancestor == id) {
            return false;
        }

        self.unlink(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.superview = Some(superview);
        }
        if let Some(node) = self.nodes.get_mut(&superview) {
            node.subviews.push(id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        true
    }

    /// Detaches a node from its superview without removing it.
    pub fn detach(&mut self, id: NodeId) {
        self.unlink(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.superview = None;
        }
    }

    /// Removes a node and its subviews, releasing their ids.
    ///
    /// Returns all removed ids, the node itself first.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }
        self.unlink(id);
        if self.root == Some(id) {
            self.root = None;
        }

        let removed = self.descendants(id);
        for id in &removed {
            self.nodes.remove(id);
            self.arena.release(*id);
        }
        removed
    }

    /// Removes the node from its superview’s subview list.
    fn unlink(&mut self, id: NodeId) {
        let superview = match self.nodes.get(&id) {
            Some(node) => node.superview,
            None => return,
        };
        if let Some(superview) = superview.and_then(|id| self.nodes.get_mut(&id)) {
            superview.subviews.retain(|subview| *subview != id);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn superview(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.superview)
    }

    pub fn subviews(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| &node.subviews[..])
            .unwrap_or(&[])
    }

    /// Iterates over the node and its ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: if self.contains(id) { Some(id) } else { None },
        }
    }

    /// Collects the node and all of its descendants in depth-first pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.subviews(id).iter().rev());
        }
        out
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    tree: &'a ViewTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.superview(current);
        Some(current)
    }
}

/// Generic access to a tree of nodes.
pub trait Hierarchy {
    type Node: Copy;

    /// The children of a node, in order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn has_children(&self, node: Self::Node) -> bool {
        !self.children(node).is_empty()
    }
}

impl Hierarchy for ViewTree {
    type Node = NodeId;

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.subviews(node).to_vec()
    }

    fn has_children(&self, node: NodeId) -> bool {
        !self.subviews(node).is_empty()
    }
}

/// Finds the outermost descendants of `root` that match `is_match`.
///
/// The scan is depth-first and in order. Descent stops at the first match along each branch, so
/// a match nested inside another match is never returned. `root` itself is not tested.
pub fn find_outermost<H, F>(hierarchy: &H, root: H::Node, mut is_match: F) -> Vec<H::Node>
where
    H: Hierarchy,
    F: FnMut(H::Node) -> bool,
{
    let mut found = Vec::new();
    if !hierarchy.has_children(root) {
        return found;
    }
    let mut stack: Vec<H::Node> = hierarchy.children(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if is_match(node) {
            found.push(node);
        } else if hierarchy.has_children(node) {
            stack.extend(hierarchy.children(node).into_iter().rev());
        }
    }
    found
}
