//! Range measurement model: Gaussian likelihood of an observed range vector given a particle position.
//!
//! Range noise is assumed independent and zero-mean Gaussian per landmark, so for particle $i$
//!
//! $$
//! \ell_i = \prod_j \exp\left( -\frac{(\hat r_{ij} - r_j)^2}{2 \sigma_s^2} \right)
//! $$
//!
//! The normalizing constant of the Gaussian is dropped since it cancels in the normalization step.
use crate::error::{MclError, Result};
use crate::geometry::Point2D;
use crate::landmarks::LandmarkSet;
use crate::particle::Particle;

use log::warn;

/// Added to every unnormalized weight so a population with no plausible particle still normalizes.
pub const WEIGHT_FLOOR: f64 = 1e-300;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeMeasurementModel {
    sensor_noise_std: f64,
}

impl RangeMeasurementModel {
    pub fn new(sensor_noise_std: f64) -> Result<Self> {
        if !sensor_noise_std.is_finite() || sensor_noise_std <= 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "sensor noise standard deviation must be finite and positive, got {sensor_noise_std}"
            )));
        }
        Ok(RangeMeasurementModel { sensor_noise_std })
    }

    pub fn sensor_noise_std(&self) -> f64 {
        self.sensor_noise_std
    }

    /// Check an observation vector against the landmark set.
    pub fn validate(&self, landmarks: &LandmarkSet, observed_ranges: &[f64]) -> Result<()> {
        if observed_ranges.len() != landmarks.len() {
            return Err(MclError::InputMismatch {
                expected: landmarks.len(),
                actual: observed_ranges.len(),
            });
        }
        if let Some((index, &value)) = observed_ranges
            .iter()
            .enumerate()
            .find(|(_, r)| !r.is_finite())
        {
            return Err(MclError::NonFiniteObservation { index, value });
        }
        Ok(())
    }

    /// Likelihood of `observed_ranges` from `position`, without the floor. Inputs are assumed validated.
    pub fn likelihood(
        &self,
        position: &Point2D,
        landmarks: &LandmarkSet,
        observed_ranges: &[f64],
    ) -> f64 {
        let two_var = 2.0 * self.sensor_noise_std * self.sensor_noise_std;
        landmarks
            .iter()
            .zip(observed_ranges.iter())
            .map(|(landmark, observed)| {
                let residual = position.distance(&landmark.position) - observed;
                (-(residual * residual) / two_var).exp()
            })
            .product()
    }

    /// Floored likelihood of every particle, in particle order.
    pub fn unnormalized_weights(
        &self,
        particles: &[Particle],
        landmarks: &LandmarkSet,
        observed_ranges: &[f64],
    ) -> Result<Vec<f64>> {
        self.validate(landmarks, observed_ranges)?;
        let likelihoods: Vec<f64> = particles
            .iter()
            .map(|p| self.likelihood(&p.position, landmarks, observed_ranges))
            .collect();
        if !particles.is_empty() && likelihoods.iter().all(|&l| l == 0.0) {
            warn!(
                "all {} particle likelihoods underflowed; weights fall back to the floor",
                particles.len()
            );
        }
        Ok(likelihoods.into_iter().map(|l| l + WEIGHT_FLOOR).collect())
    }

    /// Posterior weights for `particles` given `observed_ranges`, normalized to sum to one.
    ///
    /// Fails with [`MclError::InputMismatch`] when the observation count differs from the landmark count.
    pub fn reweight(
        &self,
        particles: &[Particle],
        landmarks: &LandmarkSet,
        observed_ranges: &[f64],
    ) -> Result<Vec<f64>> {
        let mut weights = self.unnormalized_weights(particles, landmarks, observed_ranges)?;
        let total: f64 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(MclError::InvalidWeights(format!(
                "weight sum {total} cannot be normalized"
            )));
        }
        for w in weights.iter_mut() {
            *w /= total;
        }
        Ok(weights)
    }
}
