//! Scroll position tracking.

use crate::component::Direction;
use crate::rect::Rect;
use cgmath::Vector2;

/// The last reported scroll geometry of a list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Visible region in content coordinates.
    pub viewport: Rect,
    /// Size of the scrollable content.
    pub content: Vector2<f64>,
}

impl ScrollMetrics {
    pub fn new(viewport: Rect, content: Vector2<f64>) -> ScrollMetrics {
        ScrollMetrics { viewport, content }
    }

    /// How far the far edge of the viewport has travelled through the content, in percent.
    ///
    /// Empty content counts as not scrolled at all.
    pub fn scrolled_percent(&self, direction: Direction) -> f64 {
        let content = direction.along(self.content);
        if content <= 0. {
            return 0.;
        }
        self.viewport.end_along(direction) * 100. / content
    }

    /// Whether scrolling has reached the threshold (100% if there is none).
    pub fn reached(&self, direction: Direction, threshold: Option<f64>) -> bool {
        if direction.along(self.content) <= 0. {
            return false;
        }
        self.scrolled_percent(direction) >= threshold.unwrap_or(100.)
    }
}
