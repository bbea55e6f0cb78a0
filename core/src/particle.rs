//! Weighted position hypotheses and the population that holds them.
use crate::error::{MclError, Result};
use crate::geometry::{Point2D, WorldBounds};

use nalgebra::{Matrix2, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Point2D,
    pub weight: f64,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("x", &self.position.x)
            .field("y", &self.position.y)
            .field("weight", &self.weight)
            .finish()
    }
}
impl Particle {
    pub fn new(position: Point2D, weight: f64) -> Particle {
        Particle { position, weight }
    }
}

/// An ordered population of particles. Order carries no meaning beyond making iteration reproducible.
#[derive(Clone, Default, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}
impl Debug for ParticleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        let mean = self.mean_position();
        f.debug_struct("ParticleSet")
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field(
                "mean_position",
                &format_args!("({:.3}, {:.3})", mean.x, mean.y),
            )
            .finish()
    }
}
impl ParticleSet {
    /// Spread `count` particles uniformly over the world with equal weights.
    pub fn uniform<R: Rng + ?Sized>(count: usize, bounds: &WorldBounds, rng: &mut R) -> Self {
        let weight = 1.0 / count as f64;
        let particles = (0..count)
            .map(|_| {
                let x = rng.random::<f64>() * bounds.width;
                let y = rng.random::<f64>() * bounds.height;
                Particle::new(Point2D::new(x, y), weight)
            })
            .collect();
        ParticleSet { particles }
    }
    /// Build a set from explicit positions with equal weights.
    pub fn from_positions(positions: Vec<Point2D>) -> Self {
        let weight = 1.0 / positions.len().max(1) as f64;
        ParticleSet {
            particles: positions
                .into_iter()
                .map(|p| Particle::new(p, weight))
                .collect(),
        }
    }
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        ParticleSet { particles }
    }
    pub fn len(&self) -> usize {
        self.particles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }
    pub fn positions(&self) -> Vec<Point2D> {
        self.particles.iter().map(|p| p.position).collect()
    }
    pub fn weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.weight).collect()
    }
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.particles.len() {
            return Err(MclError::InputMismatch {
                expected: self.particles.len(),
                actual: weights.len(),
            });
        }
        for (particle, &w) in self.particles.iter_mut().zip(weights.iter()) {
            particle.weight = w;
        }
        Ok(())
    }
    /// Scale weights to sum to one, falling back to uniform weights if the sum is unusable.
    pub fn normalize_weights(&mut self) {
        let sum: f64 = self.particles.iter().map(|p| p.weight).sum();
        if sum > 0.0 && sum.is_finite() {
            for particle in &mut self.particles {
                particle.weight /= sum;
            }
        } else {
            let uniform = 1.0 / self.particles.len() as f64;
            for particle in &mut self.particles {
                particle.weight = uniform;
            }
        }
    }
    /// N_eff = 1 / sum(w_i^2)
    pub fn effective_sample_size(&self) -> f64 {
        let sum_of_squares: f64 = self.particles.iter().map(|p| p.weight * p.weight).sum();
        if sum_of_squares > 0.0 {
            1.0 / sum_of_squares
        } else {
            0.0
        }
    }
    /// Arithmetic mean of the particle positions, ignoring weights. The origin for an empty set.
    pub fn mean_position(&self) -> Point2D {
        if self.particles.is_empty() {
            return Point2D::default();
        }
        let n = self.particles.len() as f64;
        let sum = self
            .particles
            .iter()
            .fold(Vector2::<f64>::zeros(), |acc, p| acc + Vector2::from(p.position));
        Point2D::from(sum / n)
    }
    /// Weight-averaged position. Weights are renormalized on the fly.
    pub fn weighted_mean_position(&self) -> Point2D {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if !(total > 0.0 && total.is_finite()) {
            return self.mean_position();
        }
        let sum = self.particles.iter().fold(Vector2::<f64>::zeros(), |acc, p| {
            acc + Vector2::from(p.position) * p.weight
        });
        Point2D::from(sum / total)
    }
    /// Unweighted sample covariance of the positions about their mean.
    pub fn covariance(&self) -> Matrix2<f64> {
        let n = self.particles.len();
        if n == 0 {
            return Matrix2::zeros();
        }
        let mean = Vector2::from(self.mean_position());
        let mut cov = Matrix2::<f64>::zeros();
        for particle in &self.particles {
            let diff = Vector2::from(particle.position) - mean;
            cov += diff * diff.transpose();
        }
        cov / n as f64
    }
    /// Mean Euclidean distance from every particle to `truth`.
    pub fn mean_error(&self, truth: &Point2D) -> f64 {
        if self.particles.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .particles
            .iter()
            .map(|p| p.position.distance(truth))
            .sum();
        total / self.particles.len() as f64
    }
}

impl From<Vec<Particle>> for ParticleSet {
    fn from(particles: Vec<Particle>) -> Self {
        ParticleSet::from_particles(particles)
    }
}
