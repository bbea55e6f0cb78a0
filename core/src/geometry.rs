//! Planar geometry primitives: points, distances, and the rectangular world the agent lives in.
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A point (or displacement) in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Point2D {
        Point2D::new(self.x + dx, self.y + dy)
    }
}

impl Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Point2D::new(tuple.0, tuple.1)
    }
}

impl From<Point2D> for Vector2<f64> {
    fn from(point: Point2D) -> Self {
        Vector2::new(point.x, point.y)
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(vector: Vector2<f64>) -> Self {
        Point2D::new(vector[0], vector[1])
    }
}

/// The rectangle `[0, width] x [0, height]` that particles and the agent are confined to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        WorldBounds {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl WorldBounds {
    pub const fn new(width: f64, height: f64) -> Self {
        WorldBounds { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.width / 2.0, self.height / 2.0)
    }

    /// Pin a point onto the rectangle. Used for the ground-truth agent, which stops at walls.
    pub fn clamp(&self, point: Point2D) -> Point2D {
        Point2D::new(
            point.x.clamp(0.0, self.width),
            point.y.clamp(0.0, self.height),
        )
    }

    /// Mirror a point that has left the rectangle back inside, one reflection per axis.
    ///
    /// Only a single bounce is applied: a point further than one world extent outside stays outside.
    /// Callers keep per-step displacement plus noise small relative to the world size.
    pub fn reflect(&self, point: Point2D) -> Point2D {
        Point2D::new(reflect(point.x, self.width), reflect(point.y, self.height))
    }
}

/// Billiard reflection of a coordinate against `[0, limit]`.
pub fn reflect(value: f64, limit: f64) -> f64 {
    if value < 0.0 {
        -value
    } else if value > limit {
        2.0 * limit - value
    } else {
        value
    }
}
