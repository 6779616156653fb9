use anyhow::{ensure, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Random walk constants for one metric
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalkParams {
    /// Width of the uniform step; offsets fall in `[-amplitude/2, amplitude/2)`
    pub amplitude: f64,
    pub min: f64,
    pub max: f64,
    /// Value used when the entity has no previous reading
    pub seed: f64,
    /// Constant bias added to every step
    #[serde(default)]
    pub drift: f64,
}

impl WalkParams {
    pub const fn new(amplitude: f64, min: f64, max: f64, seed: f64) -> Self {
        Self {
            amplitude,
            min,
            max,
            seed,
            drift: 0.0,
        }
    }

    pub const fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Reject constants that would make [`next_value`] panic or misbehave
    pub fn validate(&self, name: &str) -> Result<()> {
        ensure!(
            self.min.is_finite() && self.max.is_finite(),
            "{}: bounds must be finite (min = {}, max = {})",
            name,
            self.min,
            self.max
        );
        ensure!(
            self.min <= self.max,
            "{}: min {} is greater than max {}",
            name,
            self.min,
            self.max
        );
        ensure!(
            self.amplitude.is_finite() && self.amplitude >= 0.0,
            "{}: amplitude must be a non-negative number, got {}",
            name,
            self.amplitude
        );
        ensure!(
            self.seed.is_finite() && self.drift.is_finite(),
            "{}: seed and drift must be finite",
            name
        );
        Ok(())
    }
}

/// Next value of a bounded random walk.
///
/// `None` yields the seed unchanged. Otherwise the previous value is nudged
/// by a uniform offset plus drift, clamped to `[min, max]` and rounded to two
/// decimals.
pub fn next_value<R: Rng + ?Sized>(rng: &mut R, previous: Option<f64>, params: &WalkParams) -> f64 {
    let Some(previous) = previous else {
        return params.seed;
    };

    let u: f64 = rng.gen();
    let offset = (u - 0.5) * params.amplitude + params.drift;
    round2((previous + offset).clamp(params.min, params.max))
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
