//! Filter controller: owns the particle population and runs motion, measurement and resampling once per tick.
//!
//! The controller moves through a small lifecycle:
//!
//! ```text
//! Uninitialized --new()--> Ready --step()--> Stepping --step()--> Stepping ...
//!                            |                  |
//!                            +------stop()------+--> Stopped
//! ```
//!
//! `Uninitialized` is never observable from outside: construction either yields a `Ready` filter or fails with
//! [`MclError::InvalidConfig`]. `Stopped` is terminal and only entered when the caller asks for it.
use crate::error::{MclError, Result};
use crate::geometry::{Point2D, WorldBounds};
use crate::landmarks::LandmarkSet;
use crate::measurement::RangeMeasurementModel;
use crate::motion::MotionModel;
use crate::particle::ParticleSet;
use crate::resample::ResamplingStrategy;

use log::{debug, info};
use nalgebra::Matrix2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Filter parameters, fixed for the lifetime of a controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of particles, fixed for the run.
    pub particle_count: usize,
    /// Process noise standard deviation applied per axis per step (world units). Zero disables noise.
    pub motion_noise_std: f64,
    /// Range noise standard deviation assumed by the measurement model (world units).
    pub sensor_noise_std: f64,
    pub resampling: ResamplingStrategy,
    pub world_bounds: WorldBounds,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            particle_count: 1000,
            motion_noise_std: 5.0,
            sensor_noise_std: 10.5,
            resampling: ResamplingStrategy::default(),
            world_bounds: WorldBounds::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.particle_count == 0 {
            return Err(MclError::InvalidConfig(
                "particle count must be positive".to_string(),
            ));
        }
        if !self.motion_noise_std.is_finite() || self.motion_noise_std < 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "motion noise standard deviation must be finite and non-negative, got {}",
                self.motion_noise_std
            )));
        }
        if !self.sensor_noise_std.is_finite() || self.sensor_noise_std <= 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "sensor noise standard deviation must be finite and positive, got {}",
                self.sensor_noise_std
            )));
        }
        if !self.world_bounds.is_valid() {
            return Err(MclError::InvalidConfig(format!(
                "world bounds must be finite and positive, got {} x {}",
                self.world_bounds.width, self.world_bounds.height
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterState {
    Uninitialized,
    Ready,
    Stepping,
    Stopped,
}

/// Snapshot of what the filter believes after a step.
#[derive(Clone, Debug, PartialEq)]
pub struct Estimate {
    /// Arithmetic mean of the resampled particle positions.
    pub mean_position: Point2D,
    /// Mean distance from every particle to the ground truth, when it is known.
    pub mean_error: Option<f64>,
    /// Spread of the particle cloud about `mean_position`.
    pub covariance: Matrix2<f64>,
    /// Effective sample size of the measurement update that preceded resampling.
    pub effective_sample_size: f64,
}

impl Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {} (sigma {:.3}, {:.3}), N_eff {:.1}",
            self.mean_position,
            self.covariance[(0, 0)].sqrt(),
            self.covariance[(1, 1)].sqrt(),
            self.effective_sample_size
        )?;
        if let Some(error) = self.mean_error {
            write!(f, ", mean error {error:.3}")?;
        }
        Ok(())
    }
}

pub struct FilterController<R: Rng = StdRng> {
    config: FilterConfig,
    landmarks: LandmarkSet,
    particles: ParticleSet,
    motion: MotionModel,
    measurement: RangeMeasurementModel,
    rng: R,
    state: FilterState,
    steps: u64,
    last_effective_sample_size: f64,
}

impl<R: Rng> Debug for FilterController<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterController")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("config", &self.config)
            .field("num_landmarks", &self.landmarks.len())
            .field("particles", &self.particles)
            .finish()
    }
}

impl FilterController<StdRng> {
    /// Build a filter whose random draws come from `StdRng::seed_from_u64(seed)`.
    pub fn seeded(config: FilterConfig, landmarks: LandmarkSet, seed: u64) -> Result<Self> {
        FilterController::new(config, landmarks, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> FilterController<R> {
    /// Validate `config` and spread the particles uniformly over the world with equal weights.
    pub fn new(config: FilterConfig, landmarks: LandmarkSet, mut rng: R) -> Result<Self> {
        config.validate()?;
        let motion = MotionModel::new(config.motion_noise_std, config.world_bounds)?;
        let measurement = RangeMeasurementModel::new(config.sensor_noise_std)?;
        let particles = ParticleSet::uniform(config.particle_count, &config.world_bounds, &mut rng);
        info!(
            "Initialized particle filter: {} particles, {} landmarks, motion sigma {}, sensor sigma {}, {:?} resampling",
            config.particle_count,
            landmarks.len(),
            config.motion_noise_std,
            config.sensor_noise_std,
            config.resampling
        );
        Ok(FilterController {
            last_effective_sample_size: config.particle_count as f64,
            config,
            landmarks,
            particles,
            motion,
            measurement,
            rng,
            state: FilterState::Ready,
            steps: 0,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    /// Current population, for visualization.
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Enter the terminal `Stopped` state. Later steps fail with [`MclError::FilterStopped`].
    pub fn stop(&mut self) {
        if self.state != FilterState::Stopped {
            info!("Particle filter stopped after {} steps", self.steps);
        }
        self.state = FilterState::Stopped;
    }

    /// Run one motion, measurement, resample cycle.
    ///
    /// Inputs are validated before anything changes; on error the particle set is left exactly as it was.
    pub fn step(&mut self, dx: f64, dy: f64, observed_ranges: &[f64]) -> Result<Estimate> {
        self.advance(dx, dy, observed_ranges)?;
        let estimate = self.estimate();
        debug!("step {}: {}", self.steps, estimate);
        Ok(estimate)
    }

    /// Same as [`FilterController::step`], also reporting the mean error against `truth`.
    pub fn step_with_truth(
        &mut self,
        dx: f64,
        dy: f64,
        observed_ranges: &[f64],
        truth: &Point2D,
    ) -> Result<Estimate> {
        self.advance(dx, dy, observed_ranges)?;
        let estimate = self.estimate_with_truth(truth);
        debug!("step {}: {} (truth {})", self.steps, estimate, truth);
        Ok(estimate)
    }

    pub fn estimate(&self) -> Estimate {
        Estimate {
            mean_position: self.particles.mean_position(),
            mean_error: None,
            covariance: self.particles.covariance(),
            effective_sample_size: self.last_effective_sample_size,
        }
    }

    pub fn estimate_with_truth(&self, truth: &Point2D) -> Estimate {
        Estimate {
            mean_error: Some(self.mean_error(truth)),
            ..self.estimate()
        }
    }

    /// Average distance from each particle to `truth`.
    pub fn mean_error(&self, truth: &Point2D) -> f64 {
        self.particles.mean_error(truth)
    }

    fn advance(&mut self, dx: f64, dy: f64, observed_ranges: &[f64]) -> Result<()> {
        if self.state == FilterState::Stopped {
            return Err(MclError::FilterStopped);
        }
        if !dx.is_finite() || !dy.is_finite() {
            return Err(MclError::NonFiniteCommand { dx, dy });
        }
        self.measurement.validate(&self.landmarks, observed_ranges)?;

        let mut working = self.particles.as_slice().to_vec();
        self.motion.propagate(&mut working, dx, dy, &mut self.rng);
        let weights = self
            .measurement
            .reweight(&working, &self.landmarks, observed_ranges)?;
        let effective_sample_size = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();
        let resampled = self
            .config
            .resampling
            .resample(&working, &weights, &mut self.rng)?;

        self.particles = ParticleSet::from_particles(resampled);
        self.last_effective_sample_size = effective_sample_size;
        self.state = FilterState::Stepping;
        self.steps += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn landmarks() -> LandmarkSet {
        LandmarkSet::new(vec![
            Point2D::new(150.0, 120.0),
            Point2D::new(650.0, 140.0),
            Point2D::new(380.0, 520.0),
        ])
    }

    #[test]
    fn test_construction_is_ready() {
        let pf = FilterController::seeded(FilterConfig::default(), landmarks(), 42).unwrap();
        assert_eq!(pf.state(), FilterState::Ready);
        assert_eq!(pf.particles().len(), 1000);
        assert_eq!(pf.steps(), 0);
        let total: f64 = pf.particles().weights().iter().sum();
        assert_approx_eq!(total, 1.0, 1e-9);
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            FilterConfig {
                particle_count: 0,
                ..FilterConfig::default()
            },
            FilterConfig {
                motion_noise_std: -1.0,
                ..FilterConfig::default()
            },
            FilterConfig {
                sensor_noise_std: 0.0,
                ..FilterConfig::default()
            },
            FilterConfig {
                world_bounds: WorldBounds::new(0.0, 600.0),
                ..FilterConfig::default()
            },
            FilterConfig {
                world_bounds: WorldBounds::new(800.0, -1.0),
                ..FilterConfig::default()
            },
        ];
        for config in cases {
            let err = FilterController::seeded(config, landmarks(), 1).unwrap_err();
            assert!(matches!(err, MclError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_zero_motion_noise_is_allowed() {
        let config = FilterConfig {
            motion_noise_std: 0.0,
            ..FilterConfig::default()
        };
        assert!(FilterController::seeded(config, landmarks(), 1).is_ok());
    }

    #[test]
    fn test_step_transitions_and_keeps_size() {
        let mut pf = FilterController::seeded(FilterConfig::default(), landmarks(), 7).unwrap();
        let truth = Point2D::new(400.0, 300.0);
        let observed = landmarks().ranges_from(&truth);
        let estimate = pf.step_with_truth(0.0, 0.0, &observed, &truth).unwrap();
        assert_eq!(pf.state(), FilterState::Stepping);
        assert_eq!(pf.steps(), 1);
        assert_eq!(pf.particles().len(), 1000);
        assert!(estimate.mean_position.is_finite());
        assert!(estimate.mean_error.is_some());
        assert!(estimate.effective_sample_size >= 1.0);
        assert!(estimate.effective_sample_size <= 1000.0 + 1e-6);
        for particle in pf.particles().iter() {
            assert!(pf.config().world_bounds.contains(&particle.position));
        }
    }

    #[test]
    fn test_failed_step_leaves_state_untouched() {
        let mut pf = FilterController::seeded(FilterConfig::default(), landmarks(), 3).unwrap();
        let before = pf.particles().clone();
        let err = pf.step(1.0, 1.0, &[10.0, 20.0]).unwrap_err();
        assert!(matches!(
            err,
            MclError::InputMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(pf.particles(), &before);
        assert_eq!(pf.state(), FilterState::Ready);
        assert_eq!(pf.steps(), 0);

        let err = pf.step(f64::NAN, 0.0, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, MclError::NonFiniteCommand { .. }));
        assert_eq!(pf.particles(), &before);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut pf = FilterController::seeded(FilterConfig::default(), landmarks(), 3).unwrap();
        pf.stop();
        assert_eq!(pf.state(), FilterState::Stopped);
        let err = pf.step(0.0, 0.0, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, MclError::FilterStopped));
        assert_eq!(pf.steps(), 0);
    }

    #[test]
    fn test_estimate_without_truth_has_no_error() {
        let pf = FilterController::seeded(FilterConfig::default(), landmarks(), 5).unwrap();
        let estimate = pf.estimate();
        assert!(estimate.mean_error.is_none());
        assert_approx_eq!(estimate.effective_sample_size, 1000.0, 1e-9);
    }

    struct ZeroRng;

    impl rand::RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    #[test]
    fn test_custom_rng_injection() {
        let config = FilterConfig {
            particle_count: 10,
            ..FilterConfig::default()
        };
        let pf = FilterController::new(config, landmarks(), ZeroRng).unwrap();
        // A constant zero stream places every particle at the origin.
        for particle in pf.particles().iter() {
            assert_eq!(particle.position, Point2D::new(0.0, 0.0));
        }
    }
}
