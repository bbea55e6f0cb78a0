//! Known beacon positions used for range sensing.
use crate::geometry::{Point2D, WorldBounds};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Distance kept between randomly placed landmarks and the world edge.
pub const LANDMARK_MARGIN: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub position: Point2D,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Landmark {
            position: Point2D::new(x, y),
        }
    }
}

/// An ordered, immutable set of landmarks. Observation vectors are indexed in this order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(positions: Vec<Point2D>) -> Self {
        LandmarkSet {
            landmarks: positions
                .into_iter()
                .map(|position| Landmark { position })
                .collect(),
        }
    }

    /// Scatter `count` landmarks uniformly inside the world, away from its edges.
    ///
    /// The margin is [`LANDMARK_MARGIN`] but never more than a quarter of the smaller extent, so small
    /// worlds still get interior landmarks.
    pub fn random<R: Rng + ?Sized>(count: usize, bounds: &WorldBounds, rng: &mut R) -> Self {
        let margin_x = LANDMARK_MARGIN.min(bounds.width * 0.25);
        let margin_y = LANDMARK_MARGIN.min(bounds.height * 0.25);
        let positions = (0..count)
            .map(|_| {
                Point2D::new(
                    rng.random_range(margin_x..=bounds.width - margin_x),
                    rng.random_range(margin_y..=bounds.height - margin_y),
                )
            })
            .collect();
        LandmarkSet::new(positions)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn positions(&self) -> Vec<Point2D> {
        self.landmarks.iter().map(|l| l.position).collect()
    }

    /// Euclidean range from `point` to every landmark, in set order.
    pub fn ranges_from(&self, point: &Point2D) -> Vec<f64> {
        self.landmarks
            .iter()
            .map(|l| point.distance(&l.position))
            .collect()
    }
}

impl From<Vec<Point2D>> for LandmarkSet {
    fn from(positions: Vec<Point2D>) -> Self {
        LandmarkSet::new(positions)
    }
}
