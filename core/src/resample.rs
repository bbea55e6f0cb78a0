//! Resampling: draw a fresh, equally weighted population in proportion to the current weights.
//!
//! Multinomial resampling is the baseline. Systematic, stratified and residual resampling are lower-variance
//! alternatives that select each particle with the same expected number of copies.
use crate::error::{MclError, Result};
use crate::particle::Particle;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    #[default]
    Multinomial,
    Systematic,
    Stratified,
    Residual,
}

impl ResamplingStrategy {
    /// Draw `particles.len()` particles with replacement, each with probability proportional to `weights`.
    ///
    /// Weights are renormalized here; negative or NaN entries count as zero. The returned particles carry
    /// uniform weights `1/N`.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        particles: &[Particle],
        weights: &[f64],
        rng: &mut R,
    ) -> Result<Vec<Particle>> {
        if weights.len() != particles.len() {
            return Err(MclError::InputMismatch {
                expected: particles.len(),
                actual: weights.len(),
            });
        }
        if particles.is_empty() {
            return Ok(Vec::new());
        }
        let cumulative = CumulativeWeights::new(weights)?;
        let indices = match self {
            ResamplingStrategy::Multinomial => multinomial_indices(&cumulative, rng),
            ResamplingStrategy::Systematic => systematic_indices(&cumulative, rng),
            ResamplingStrategy::Stratified => stratified_indices(&cumulative, rng),
            ResamplingStrategy::Residual => residual_indices(&cumulative, rng),
        };
        let uniform = 1.0 / particles.len() as f64;
        Ok(indices
            .into_iter()
            .map(|i| Particle::new(particles[i].position, uniform))
            .collect())
    }
}

/// Running sum of the sanitized weights, with the last index that carries mass.
///
/// Weights are divided by their maximum first, so the sums stay finite for any magnitude of input.
struct CumulativeWeights {
    scaled: Vec<f64>,
    sums: Vec<f64>,
    total: f64,
    last_positive: usize,
}

impl CumulativeWeights {
    fn new(weights: &[f64]) -> Result<Self> {
        let max = weights.iter().map(|&w| sanitize(w)).fold(0.0, f64::max);
        if !max.is_finite() {
            return Err(MclError::InvalidWeights(format!(
                "weights must be finite, got a maximum of {max}"
            )));
        }
        if max <= 0.0 {
            return Err(MclError::InvalidWeights(
                "all weights are zero or negative".to_string(),
            ));
        }
        let scaled: Vec<f64> = weights.iter().map(|&w| sanitize(w) / max).collect();
        let mut sums = Vec::with_capacity(scaled.len());
        let mut total = 0.0;
        let mut last_positive = 0;
        for (i, &w) in scaled.iter().enumerate() {
            if w > 0.0 {
                last_positive = i;
            }
            total += w;
            sums.push(total);
        }
        Ok(CumulativeWeights {
            scaled,
            sums,
            total,
            last_positive,
        })
    }

    fn len(&self) -> usize {
        self.sums.len()
    }

    /// Index of the particle whose cumulative interval contains `u` in `[0, total)`.
    fn index_of(&self, u: f64) -> usize {
        self.sums
            .partition_point(|&c| c <= u)
            .min(self.last_positive)
    }

    /// Indices for a non-decreasing sequence of positions, walking the sums once.
    fn indices_of_sorted(&self, positions: &[f64]) -> Vec<usize> {
        let mut indices = Vec::with_capacity(positions.len());
        let mut i = 0;
        for &u in positions {
            while i < self.last_positive && self.sums[i] <= u {
                i += 1;
            }
            indices.push(i);
        }
        indices
    }
}

fn sanitize(weight: f64) -> f64 {
    if weight > 0.0 { weight } else { 0.0 }
}

fn multinomial_indices<R: Rng + ?Sized>(cumulative: &CumulativeWeights, rng: &mut R) -> Vec<usize> {
    (0..cumulative.len())
        .map(|_| cumulative.index_of(rng.random::<f64>() * cumulative.total))
        .collect()
}

fn systematic_indices<R: Rng + ?Sized>(cumulative: &CumulativeWeights, rng: &mut R) -> Vec<usize> {
    let n = cumulative.len();
    let step = cumulative.total / n as f64;
    let offset = rng.random::<f64>() * step;
    let positions: Vec<f64> = (0..n).map(|k| offset + k as f64 * step).collect();
    cumulative.indices_of_sorted(&positions)
}

fn stratified_indices<R: Rng + ?Sized>(cumulative: &CumulativeWeights, rng: &mut R) -> Vec<usize> {
    let n = cumulative.len();
    let step = cumulative.total / n as f64;
    let positions: Vec<f64> = (0..n)
        .map(|k| (k as f64 + rng.random::<f64>()) * step)
        .collect();
    cumulative.indices_of_sorted(&positions)
}

/// Deterministic `floor(N w_i)` copies, then systematic draws over the leftover mass.
fn residual_indices<R: Rng + ?Sized>(cumulative: &CumulativeWeights, rng: &mut R) -> Vec<usize> {
    let n = cumulative.len();
    let scale = n as f64 / cumulative.total;
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; n];
    for (i, &w) in cumulative.scaled.iter().enumerate() {
        let expected = w * scale;
        let copies = (expected.floor() as usize).min(n - indices.len());
        indices.extend(std::iter::repeat_n(i, copies));
        residual[i] = expected - copies as f64;
    }
    let remaining = n - indices.len();
    if remaining == 0 {
        return indices;
    }
    match CumulativeWeights::new(&residual) {
        Ok(leftover) => {
            let step = leftover.total / remaining as f64;
            let offset = rng.random::<f64>() * step;
            let positions: Vec<f64> = (0..remaining).map(|k| offset + k as f64 * step).collect();
            indices.extend(leftover.indices_of_sorted(&positions));
        }
        // Rounding left no residual mass; top up from the full distribution.
        Err(_) => indices.extend(
            (0..remaining).map(|_| cumulative.index_of(rng.random::<f64>() * cumulative.total)),
        ),
    }
    indices
}
