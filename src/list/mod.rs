//! Virtualized lists.
//!
//! A list shows its items through a small number of cells cloned from one template. Cells that
//! scroll out of view go back to a [`RecycledPool`] and are bound to other items later; the
//! [`ItemContextResolver`] makes sure each item gets its own context back when that happens.

mod pool;
mod resolver;
mod scroll;
mod view;

pub use pool::RecycledPool;
pub use resolver::ItemContextResolver;
pub use scroll::ScrollMetrics;
pub use view::{DataChange, ItemState, ListSnapshot, ListView};
