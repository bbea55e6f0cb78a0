//! Simulated range sensor: ranges from a ground-truth pose to each landmark.
use crate::error::{MclError, Result};
use crate::geometry::Point2D;
use crate::landmarks::LandmarkSet;

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Produces the observation vector a real range sensor would report at a known pose.
///
/// With zero noise the ranges are exact Euclidean distances. A positive `noise_std` adds independent
/// zero-mean Gaussian noise per landmark; the result is floored at zero since a range cannot be negative.
#[derive(Clone, Debug, Default)]
pub struct SensorSimulator {
    noise: Option<Normal<f64>>,
}

impl SensorSimulator {
    pub fn new(noise_std: f64) -> Result<Self> {
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "range noise standard deviation must be finite and non-negative, got {noise_std}"
            )));
        }
        let noise = if noise_std > 0.0 {
            Some(
                Normal::new(0.0, noise_std)
                    .map_err(|e| MclError::InvalidConfig(format!("range noise: {e}")))?,
            )
        } else {
            None
        };
        Ok(SensorSimulator { noise })
    }

    /// Exact sensor.
    pub fn noiseless() -> Self {
        SensorSimulator { noise: None }
    }

    pub fn noise_std(&self) -> f64 {
        self.noise.map_or(0.0, |n| n.std_dev())
    }

    /// Noise-free ranges from `pose` to each landmark, in landmark order.
    pub fn true_ranges(pose: &Point2D, landmarks: &LandmarkSet) -> Vec<f64> {
        landmarks.ranges_from(pose)
    }

    pub fn measure<R: Rng + ?Sized>(
        &self,
        pose: &Point2D,
        landmarks: &LandmarkSet,
        rng: &mut R,
    ) -> Vec<f64> {
        let ranges = Self::true_ranges(pose, landmarks);
        match &self.noise {
            Some(normal) => ranges
                .into_iter()
                .map(|r| (r + normal.sample(rng)).max(0.0))
                .collect(),
            None => ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn landmarks() -> LandmarkSet {
        LandmarkSet::new(vec![Point2D::new(0.0, 0.0), Point2D::new(30.0, 40.0)])
    }

    #[test]
    fn test_noiseless_ranges() {
        let sensor = SensorSimulator::noiseless();
        let mut rng = StdRng::seed_from_u64(1);
        let ranges = sensor.measure(&Point2D::new(0.0, 0.0), &landmarks(), &mut rng);
        assert_approx_eq!(ranges[0], 0.0, 1e-12);
        assert_approx_eq!(ranges[1], 50.0, 1e-12);
    }

    #[test]
    fn test_noisy_ranges_are_nonnegative_and_near_truth() {
        let sensor = SensorSimulator::new(1.0).unwrap();
        assert_approx_eq!(sensor.noise_std(), 1.0, 1e-12);
        let mut rng = StdRng::seed_from_u64(9);
        let mut sum = 0.0;
        for _ in 0..2000 {
            let ranges = sensor.measure(&Point2D::new(0.0, 0.0), &landmarks(), &mut rng);
            assert!(ranges[0] >= 0.0);
            sum += ranges[1];
        }
        assert!((sum / 2000.0 - 50.0).abs() < 0.2);
    }

    #[test]
    fn test_invalid_noise() {
        assert!(matches!(
            SensorSimulator::new(-0.5),
            Err(MclError::InvalidConfig(_))
        ));
    }
}
