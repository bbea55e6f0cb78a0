//! Motion model: commanded displacement plus Gaussian process noise, reflected at the world edges.
//!
//! Every particle is moved by
//!
//! $$
//! x' = x + d_x + \epsilon_x, \quad y' = y + d_y + \epsilon_y, \quad \epsilon \sim \mathcal{N}(0, \sigma_m^2)
//! $$
//!
//! and any coordinate that leaves `[0, extent]` is mirrored back across the edge it crossed (billiard reflection)
//! instead of being clamped onto it, so particles do not pile up along the walls. A single reflection per axis
//! is applied; this assumes the displacement plus noise in one step is small next to the world size.
use crate::error::{MclError, Result};
use crate::geometry::WorldBounds;
use crate::particle::Particle;

use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Clone, Debug)]
pub struct MotionModel {
    noise_std: f64,
    noise: Option<Normal<f64>>,
    bounds: WorldBounds,
}

impl MotionModel {
    /// A zero `noise_std` gives exact, draw-free motion.
    pub fn new(noise_std: f64, bounds: WorldBounds) -> Result<Self> {
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "motion noise standard deviation must be finite and non-negative, got {noise_std}"
            )));
        }
        let noise = if noise_std > 0.0 {
            Some(
                Normal::new(0.0, noise_std)
                    .map_err(|e| MclError::InvalidConfig(format!("motion noise: {e}")))?,
            )
        } else {
            None
        };
        Ok(MotionModel {
            noise_std,
            noise,
            bounds,
        })
    }

    pub fn noise_std(&self) -> f64 {
        self.noise_std
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Move every particle in place. Weights are left untouched.
    ///
    /// Noise is drawn x then y for each particle in slice order, so a seeded `rng` reproduces a run exactly.
    pub fn propagate<R: Rng + ?Sized>(&self, particles: &mut [Particle], dx: f64, dy: f64, rng: &mut R) {
        for particle in particles.iter_mut() {
            let (noise_x, noise_y) = match &self.noise {
                Some(normal) => (normal.sample(rng), normal.sample(rng)),
                None => (0.0, 0.0),
            };
            let moved = particle.position.translate(dx + noise_x, dy + noise_y);
            particle.position = self.bounds.reflect(moved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn particle_at(x: f64, y: f64) -> Particle {
        Particle::new(Point2D::new(x, y), 1.0)
    }

    #[test]
    fn test_zero_noise_translation() {
        let model = MotionModel::new(0.0, WorldBounds::new(800.0, 600.0)).unwrap();
        let mut particles = vec![particle_at(100.0, 100.0), particle_at(400.0, 300.0)];
        let mut rng = StdRng::seed_from_u64(42);
        model.propagate(&mut particles, 5.0, -5.0, &mut rng);
        assert_approx_eq!(particles[0].position.x, 105.0, 1e-12);
        assert_approx_eq!(particles[0].position.y, 95.0, 1e-12);
        assert_approx_eq!(particles[1].position.x, 405.0, 1e-12);
        assert_approx_eq!(particles[1].position.y, 295.0, 1e-12);
    }

    #[test]
    fn test_reflection_off_far_edge() {
        let width = 800.0;
        let model = MotionModel::new(0.0, WorldBounds::new(width, 600.0)).unwrap();
        let mut particles = vec![particle_at(width, 300.0)];
        let mut rng = StdRng::seed_from_u64(0);
        model.propagate(&mut particles, 5.0, 0.0, &mut rng);
        assert_approx_eq!(particles[0].position.x, width - 5.0, 1e-12);
    }

    #[test]
    fn test_reflection_off_origin_edge() {
        let model = MotionModel::new(0.0, WorldBounds::new(800.0, 600.0)).unwrap();
        let mut particles = vec![particle_at(0.0, 0.0)];
        let mut rng = StdRng::seed_from_u64(0);
        model.propagate(&mut particles, -3.0, -7.0, &mut rng);
        assert_approx_eq!(particles[0].position.x, 3.0, 1e-12);
        assert_approx_eq!(particles[0].position.y, 7.0, 1e-12);
    }

    #[test]
    fn test_reflection_in_height() {
        let model = MotionModel::new(0.0, WorldBounds::new(800.0, 600.0)).unwrap();
        let mut particles = vec![particle_at(10.0, 598.0)];
        let mut rng = StdRng::seed_from_u64(0);
        model.propagate(&mut particles, 0.0, 4.0, &mut rng);
        assert_approx_eq!(particles[0].position.y, 598.0, 1e-12);
    }

    #[test]
    fn test_weights_untouched() {
        let model = MotionModel::new(2.0, WorldBounds::new(800.0, 600.0)).unwrap();
        let mut particles = vec![Particle::new(Point2D::new(50.0, 50.0), 0.125)];
        let mut rng = StdRng::seed_from_u64(3);
        model.propagate(&mut particles, 1.0, 1.0, &mut rng);
        assert_approx_eq!(particles[0].weight, 0.125, 1e-15);
    }

    #[test]
    fn test_noise_statistics() {
        let model = MotionModel::new(2.0, WorldBounds::new(1000.0, 1000.0)).unwrap();
        let mut particles = vec![particle_at(500.0, 500.0); 5000];
        let mut rng = StdRng::seed_from_u64(11);
        model.propagate(&mut particles, 3.0, 0.0, &mut rng);
        let n = particles.len() as f64;
        let mean_x = particles.iter().map(|p| p.position.x).sum::<f64>() / n;
        let var_x = particles
            .iter()
            .map(|p| (p.position.x - mean_x).powi(2))
            .sum::<f64>()
            / n;
        assert!((mean_x - 503.0).abs() < 0.2);
        assert!((var_x.sqrt() - 2.0).abs() < 0.15);
    }

    #[test]
    fn test_seeded_propagation_is_reproducible() {
        let model = MotionModel::new(5.0, WorldBounds::new(800.0, 600.0)).unwrap();
        let mut a = vec![particle_at(400.0, 300.0); 50];
        let mut b = a.clone();
        model.propagate(&mut a, 1.0, 2.0, &mut StdRng::seed_from_u64(99));
        model.propagate(&mut b, 1.0, 2.0, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_noise_rejected() {
        let err = MotionModel::new(-1.0, WorldBounds::default()).unwrap_err();
        assert!(matches!(err, MclError::InvalidConfig(_)));
    }
}
