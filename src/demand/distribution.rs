// src/demand/distribution.rs

use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distribution family chosen by the caller for daily demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    #[default]
    Normal,
    Exponential,
    #[serde(alias = "log_normal", alias = "log-normal")]
    LogNormal,
    Gamma,
    Uniform,
}

impl FromStr for DistributionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "normal" | "gaussian" => Ok(DistributionKind::Normal),
            "exponential" | "exp" => Ok(DistributionKind::Exponential),
            "lognormal" => Ok(DistributionKind::LogNormal),
            "gamma" => Ok(DistributionKind::Gamma),
            "uniform" => Ok(DistributionKind::Uniform),
            other => Err(format!("unknown distribution '{other}'")),
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributionKind::Normal => "normal",
            DistributionKind::Exponential => "exponential",
            DistributionKind::LogNormal => "lognormal",
            DistributionKind::Gamma => "gamma",
            DistributionKind::Uniform => "uniform",
        };
        f.write_str(s)
    }
}

/// Analytically fitted parameters for one family.
///
/// `Degenerate` stands in whenever the family cannot be fitted (zero variance,
/// no positive samples) and always draws its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FittedDistribution {
    Normal { mean: f64, std_dev: f64 },
    Exponential { rate: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
    Uniform { min: f64, max: f64 },
    Degenerate { value: f64 },
}

impl FittedDistribution {
    /// Fits `kind` to observed samples.
    pub fn fit(kind: DistributionKind, samples: &[f64]) -> Self {
        let mean = mean(samples);
        let std_dev = population_std(samples);

        match kind {
            DistributionKind::LogNormal => {
                // Log-space moments of the positive observations
                let logs: Vec<f64> = samples.iter().filter(|v| **v > 0.0).map(|v| v.ln()).collect();
                if logs.is_empty() {
                    FittedDistribution::Degenerate { value: mean.max(0.0) }
                } else {
                    FittedDistribution::LogNormal {
                        mu: self::mean(&logs),
                        sigma: population_std(&logs),
                    }
                }
            }
            DistributionKind::Uniform => {
                let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
                let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if min < max {
                    FittedDistribution::Uniform { min, max }
                } else {
                    FittedDistribution::Degenerate { value: mean.max(0.0) }
                }
            }
            _ => Self::from_moments(kind, mean, std_dev),
        }
    }

    /// Fits `kind` from a mean and standard deviation alone.
    pub fn from_moments(kind: DistributionKind, mean: f64, std_dev: f64) -> Self {
        let variance = std_dev * std_dev;
        match kind {
            DistributionKind::Normal => FittedDistribution::Normal { mean, std_dev },
            DistributionKind::Exponential if mean > 0.0 => {
                FittedDistribution::Exponential { rate: 1.0 / mean }
            }
            DistributionKind::LogNormal if mean > 0.0 => {
                let cv = std_dev / mean;
                let sigma2 = (1.0 + cv * cv).ln();
                FittedDistribution::LogNormal {
                    mu: mean.ln() - sigma2 / 2.0,
                    sigma: sigma2.sqrt(),
                }
            }
            DistributionKind::Gamma if mean > 0.0 && variance > 0.0 => FittedDistribution::Gamma {
                shape: mean * mean / variance,
                scale: variance / mean,
            },
            DistributionKind::Uniform if std_dev > 0.0 => {
                let half_width = 3f64.sqrt() * std_dev;
                FittedDistribution::Uniform {
                    min: mean - half_width,
                    max: mean + half_width,
                }
            }
            _ => FittedDistribution::Degenerate { value: mean.max(0.0) },
        }
    }

    /// Expected value of the fitted distribution.
    pub fn mean(&self) -> f64 {
        match *self {
            FittedDistribution::Normal { mean, .. } => mean,
            FittedDistribution::Exponential { rate } => 1.0 / rate,
            FittedDistribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            FittedDistribution::Gamma { shape, scale } => shape * scale,
            FittedDistribution::Uniform { min, max } => (min + max) / 2.0,
            FittedDistribution::Degenerate { value } => value,
        }
    }

    /// One draw. Parameters rejected by `rand_distr` fall back to the mean.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            FittedDistribution::Normal { mean, std_dev } => Normal::new(mean, std_dev)
                .map(|d| d.sample(rng))
                .unwrap_or(mean),
            FittedDistribution::Exponential { rate } => Exp::new(rate)
                .map(|d| d.sample(rng))
                .unwrap_or_else(|_| self.mean()),
            FittedDistribution::LogNormal { mu, sigma } => LogNormal::new(mu, sigma)
                .map(|d| d.sample(rng))
                .unwrap_or_else(|_| self.mean()),
            FittedDistribution::Gamma { shape, scale } => Gamma::new(shape, scale)
                .map(|d| d.sample(rng))
                .unwrap_or_else(|_| self.mean()),
            FittedDistribution::Uniform { min, max } => {
                if min < max {
                    Uniform::new(min, max).sample(rng)
                } else {
                    min
                }
            }
            FittedDistribution::Degenerate { value } => value,
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Least-squares slope of `values` against their index.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
