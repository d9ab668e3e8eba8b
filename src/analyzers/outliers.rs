//! Outlier detection and correction for per-state score maps.

use serde::Serialize;
use std::collections::HashMap;

use crate::analyzers::utility::{mean, median, stddev};

/// Distance from the median, in standard deviations, beyond which a score is
/// an outlier.
pub const DEFAULT_STD_MULTIPLE: f64 = 2.0;

/// Summary statistics of the uncorrected distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub median: f64,
    pub mean: f64,
    pub standard_deviation: f64,
}

/// Decides what an outlier's score is replaced with.
pub trait CorrectionPolicy: Send + Sync {
    fn correct(&self, score: f64, distribution: &Distribution, std_multiple: f64) -> f64;
}

/// Pulls an outlier back to the edge of the accepted band around the median,
/// staying inside the 0-100 score range.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampToBand;

impl CorrectionPolicy for ClampToBand {
    fn correct(&self, score: f64, distribution: &Distribution, std_multiple: f64) -> f64 {
        let band = std_multiple * distribution.standard_deviation;
        let low = (distribution.median - band).max(0.0);
        let high = (distribution.median + band).min(100.0);
        if low.is_nan() || high.is_nan() || low > high {
            return score;
        }
        score.clamp(low, high)
    }
}

/// Result of an outlier pass over one category's scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    /// Outlier states, sorted.
    pub outliers: Vec<String>,
    pub corrected_scores: HashMap<String, f64>,
    pub median: f64,
    pub mean: f64,
    pub standard_deviation: f64,
}

pub struct OutlierDetector {
    std_multiple: f64,
    policy: Box<dyn CorrectionPolicy>,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STD_MULTIPLE, Box::new(ClampToBand))
    }
}

impl OutlierDetector {
    pub fn new(std_multiple: f64, policy: Box<dyn CorrectionPolicy>) -> Self {
        Self { std_multiple, policy }
    }

    /// Flags scores further than `std_multiple` standard deviations from the
    /// median and replaces them through the correction policy. Everything else
    /// passes through untouched.
    pub fn detect(&self, scores: &HashMap<String, f64>) -> OutlierReport {
        let values: Vec<f64> = scores.values().copied().collect();
        let avg = mean(&values);
        let distribution = Distribution {
            median: median(&values),
            mean: avg,
            standard_deviation: stddev(&values, avg),
        };
        let limit = self.std_multiple * distribution.standard_deviation;

        let mut outliers = Vec::new();
        let mut corrected_scores = HashMap::with_capacity(scores.len());

        for (state, &score) in scores {
            if (score - distribution.median).abs() > limit {
                outliers.push(state.clone());
                corrected_scores.insert(
                    state.clone(),
                    self.policy.correct(score, &distribution, self.std_multiple),
                );
            } else {
                corrected_scores.insert(state.clone(), score);
            }
        }
        outliers.sort();

        OutlierReport {
            outliers,
            corrected_scores,
            median: distribution.median,
            mean: distribution.mean,
            standard_deviation: distribution.standard_deviation,
        }
    }
}
