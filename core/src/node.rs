//! Node handles and their allocator.

use core::fmt;

/// A unique identifier for a node in a [`ViewTree`](crate::ViewTree).
///
/// Identifiers are issued by a [`NodeArena`] and are only meaningful for the arena that issued
/// them. When a node is released its slot may be reused, but with a new generation, so a stale
/// handle never refers to the node that took its place.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// The slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// The slot generation.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    live: bool,
}

/// Issues and releases node handles.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    /// Allocates a fresh handle.
    pub fn allocate(&mut self) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.live = true;
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            live: true,
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Releases a handle so its slot can be reused.
    ///
    /// Returns false if the handle was stale or already released.
    pub fn release(&mut self, id: NodeId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        self.slots[id.index as usize].live = false;
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    /// Returns true if the handle refers to a live node.
    pub fn is_live(&self, id: NodeId) -> bool {
        match self.slots.get(id.index as usize) {
            Some(slot) => slot.live && slot.generation == id.generation,
            None => false,
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
