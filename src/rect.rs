//! Rectangles.

use crate::component::Direction;
use cgmath::{Point2, Vector2, Zero};

/// A rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point2<f64>,

    /// Rectangle size.
    pub size: Vector2<f64>,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(origin: Point2<f64>, size: Vector2<f64>) -> Rect {
        Rect { origin, size }
    }

    /// Returns a zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::new(0., 0.),
            size: Vector2::zero(),
        }
    }

    /// Returns the origin coordinate along an axis.
    pub fn start_along(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Vertical => self.origin.y,
            Direction::Horizontal => self.origin.x,
        }
    }

    /// Returns the size along an axis.
    pub fn extent_along(&self, direction: Direction) -> f64 {
        direction.along(self.size)
    }

    /// Returns the far edge coordinate along an axis.
    pub fn end_along(&self, direction: Direction) -> f64 {
        self.start_along(direction) + self.extent_along(direction)
    }
}
