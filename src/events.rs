//! Events.

use crate::rect::Rect;
use cgmath::Vector2;
use perch_core::NodeId;
use std::ops::Range;

/// Events sent by the native host to a [`Screen`](crate::Screen).
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    /// A node’s native view was attached to the rendering surface.
    Attached(NodeId),

    /// A node’s native view was detached from the rendering surface.
    Detached(NodeId),

    /// The items of a list that are currently visible.
    VisibleRange { list: NodeId, range: Range<usize> },

    /// A list was scrolled.
    Scroll {
        list: NodeId,
        /// The visible region in content coordinates; its origin is the scroll offset.
        viewport: Rect,
        /// Size of the scrollable content.
        content: Vector2<f64>,
    },

    /// A frame was rendered. Lists re-check their scroll position.
    Frame,
}
