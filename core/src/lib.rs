//! Monte Carlo localization toolbox for a planar agent ranging to known landmarks
//!
//! This crate estimates the unknown 2-D position of a moving agent from noisy range measurements to a fixed set
//! of landmarks (beacons) whose positions are known ahead of time. The estimator is a sequential Monte Carlo
//! filter (a particle filter): a population of position hypotheses is propagated with the commanded motion and
//! random process noise, reweighted against the observed ranges, and then resampled in proportion to weight.
//!
//! The crate deliberately does not render anything, poll input devices, or persist filter state. A driver (see
//! [`sim`] or the `mcl-sim` binary) supplies a commanded displacement and an observation vector every tick and
//! receives an [`filter::Estimate`] back. Read access to the particle cloud is provided so that an external
//! renderer can draw it.
//!
//! # Filter cycle
//!
//! Each call to [`filter::FilterController::step`] runs three stages in a fixed order:
//!
//! 1. **Motion** ([`motion::MotionModel`]): every particle moves by the commanded displacement $(d_x, d_y)$ plus
//!    independent zero-mean Gaussian noise on each axis. Particles leaving the world are reflected off its edges.
//! 2. **Measurement** ([`measurement::RangeMeasurementModel`]): with $r_j$ the observed range to landmark $j$ and
//!    $\hat r_{ij}$ the range predicted for particle $i$, the unnormalized weight is
//!
//! $$
//! w_i = \prod_j \exp\left( -\frac{(\hat r_{ij} - r_j)^2}{2 \sigma_s^2} \right) + 10^{-300}
//! $$
//!
//!    and the weights are normalized to sum to one.
//! 3. **Resampling** ([`resample::ResamplingStrategy`]): a new population of the same size is drawn with
//!    replacement in proportion to weight.
//!
//! The estimate reported afterwards is the arithmetic mean of the resampled particles. When the ground truth is
//! known (simulation and testing) the mean Euclidean distance from each particle to the truth is reported too.
//!
//! # Randomness
//!
//! Every random draw goes through a caller supplied [`rand::Rng`]. Seeding a [`rand::rngs::StdRng`] makes a run
//! bit-for-bit reproducible.
//!
//! # Coordinates
//!
//! Positions are expressed in world units with the origin at the top-left corner of a `width` x `height`
//! rectangle and `y` growing downward (screen convention). [`sim::Heading::North`] therefore moves toward
//! smaller `y`.

pub mod error;
pub mod filter;
pub mod geometry;
pub mod landmarks;
pub mod measurement;
pub mod motion;
pub mod particle;
pub mod resample;
pub mod sensor;
pub mod sim;

pub use error::{MclError, Result};
pub use filter::{Estimate, FilterConfig, FilterController, FilterState};
pub use geometry::{Point2D, WorldBounds};
pub use landmarks::{Landmark, LandmarkSet};
pub use particle::{Particle, ParticleSet};
