// src/demand/model.rs

//! Demand model: fits a historical series once at simulation start and
//! generates one demand figure per simulated day.

use crate::demand::distribution::{
    linear_slope, mean, population_std, DistributionKind, FittedDistribution,
};
use crate::error::{EngineError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, warn};

/// No generated day ever has less demand than this.
pub const MIN_DEMAND: f64 = 1.0;
/// Below this many points the fit is flagged unreliable.
pub const MIN_RELIABLE_POINTS: usize = 5;
pub const TREND_WINDOW: usize = 14;
pub const TREND_MIN_POINTS: usize = 3;
/// Relative slope (per day, as a share of the mean) treated as flat.
pub const TREND_DEAD_ZONE: f64 = 0.005;
pub const TREND_FACTOR_BOUNDS: (f64, f64) = (0.5, 1.5);
pub const SEASONAL_MIN_POINTS: usize = 14;
/// CV across the seven weekday averages above which seasonality is flagged.
pub const SEASONALITY_THRESHOLD: f64 = 0.10;
/// Coefficient of variation assumed for short, unreliable histories.
pub const FALLBACK_CV: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Read-only description of the historical series and the fitted distribution.
#[derive(Debug, Clone, Serialize)]
pub struct DemandConfig {
    pub samples: usize,
    pub reliable: bool,
    pub mean: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    /// Units per day.
    pub trend_slope: f64,
    pub trend: TrendDirection,
    pub seasonal: bool,
    /// Multipliers per weekday offset; averages to 1.
    pub seasonal_factors: [f64; 7],
    pub kind: DistributionKind,
    pub distribution: FittedDistribution,
}

impl DemandConfig {
    /// Fits `history` for the `kind` family.
    ///
    /// Non-finite points are ignored and negative points count as zero. An
    /// empty history is a configuration error.
    pub fn fit(history: &[f64], kind: DistributionKind) -> Result<Self> {
        let clean: Vec<f64> = history
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .map(|v| v.max(0.0))
            .collect();

        if clean.is_empty() {
            return Err(EngineError::EmptyDemandHistory);
        }

        if clean.len() < MIN_RELIABLE_POINTS {
            let m = mean(&clean).max(MIN_DEMAND);
            warn!(
                points = clean.len(),
                mean = m,
                "demand history too short, falling back to fixed variability"
            );
            let std_dev = m * FALLBACK_CV;
            return Ok(Self {
                samples: clean.len(),
                reliable: false,
                mean: m,
                std_dev,
                coefficient_of_variation: FALLBACK_CV,
                trend_slope: 0.0,
                trend: TrendDirection::Stable,
                seasonal: false,
                seasonal_factors: [1.0; 7],
                kind,
                distribution: FittedDistribution::from_moments(kind, m, std_dev),
            });
        }

        let m = mean(&clean);
        let std_dev = population_std(&clean);
        let cv = if m > 0.0 { std_dev / m } else { 0.0 };
        let (trend_slope, trend) = detect_trend(&clean, m);
        let (seasonal, seasonal_factors) = detect_weekly_pattern(&clean);

        let config = Self {
            samples: clean.len(),
            reliable: true,
            mean: m,
            std_dev,
            coefficient_of_variation: cv,
            trend_slope,
            trend,
            seasonal,
            seasonal_factors,
            kind,
            distribution: FittedDistribution::fit(kind, &clean),
        };
        debug!(
            mean = config.mean,
            std_dev = config.std_dev,
            trend = ?config.trend,
            seasonal = config.seasonal,
            "demand model fitted"
        );
        Ok(config)
    }

    /// Multiplier for the `day_index`-th simulated day (1-based).
    pub fn trend_factor(&self, day_index: usize) -> f64 {
        if self.trend == TrendDirection::Stable || self.mean <= 0.0 {
            return 1.0;
        }
        let relative = self.trend_slope / self.mean;
        let (lo, hi) = TREND_FACTOR_BOUNDS;
        (1.0 + relative * day_index as f64).clamp(lo, hi)
    }

    /// Weekday multiplier; the weekly phase continues from the end of the history.
    pub fn seasonal_factor(&self, day_index: usize) -> f64 {
        if !self.seasonal {
            return 1.0;
        }
        let offset = (self.samples + day_index.saturating_sub(1)) % 7;
        self.seasonal_factors[offset]
    }

    /// One demand figure for `day_index`, never below `MIN_DEMAND`.
    pub fn draw<R: Rng + ?Sized>(&self, day_index: usize, rng: &mut R) -> f64 {
        let base = self.distribution.sample(rng);
        let value = base * self.trend_factor(day_index) * self.seasonal_factor(day_index);
        if value.is_finite() {
            value.max(MIN_DEMAND)
        } else {
            MIN_DEMAND
        }
    }
}

fn detect_trend(values: &[f64], overall_mean: f64) -> (f64, TrendDirection) {
    if values.len() < TREND_MIN_POINTS {
        return (0.0, TrendDirection::Stable);
    }
    let window = &values[values.len().saturating_sub(TREND_WINDOW)..];
    let slope = linear_slope(window);
    if overall_mean <= 0.0 {
        return (slope, TrendDirection::Stable);
    }
    let relative = slope / overall_mean;
    let direction = if relative > TREND_DEAD_ZONE {
        TrendDirection::Increasing
    } else if relative < -TREND_DEAD_ZONE {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    (slope, direction)
}

fn detect_weekly_pattern(values: &[f64]) -> (bool, [f64; 7]) {
    if values.len() < SEASONAL_MIN_POINTS {
        return (false, [1.0; 7]);
    }
    let mut sums = [0.0; 7];
    let mut counts = [0usize; 7];
    for (i, v) in values.iter().enumerate() {
        sums[i % 7] += v;
        counts[i % 7] += 1;
    }
    let mut averages = [0.0; 7];
    for d in 0..7 {
        averages[d] = sums[d] / counts[d] as f64;
    }

    let overall = mean(&averages);
    if overall <= 0.0 {
        return (false, [1.0; 7]);
    }
    let cv = population_std(&averages) / overall;
    if cv <= SEASONALITY_THRESHOLD {
        return (false, [1.0; 7]);
    }

    let mut factors = [1.0; 7];
    for d in 0..7 {
        factors[d] = averages[d] / overall;
    }
    (true, factors)
}

/// Seeded source of daily demand for one run.
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    config: DemandConfig,
    rng: ChaCha8Rng,
}

impl DemandGenerator {
    /// Seeds once; without a seed the generator draws from process entropy.
    pub fn new(config: DemandConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn next_demand(&mut self, day_index: usize) -> f64 {
        self.config.draw(day_index, &mut self.rng)
    }
}
