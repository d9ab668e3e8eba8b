//! Cross-state z-score normalization into 0-100 scores.

use std::collections::HashMap;

use crate::analyzers::utility::{mean, stddev};

pub const SCORE_CENTER: f64 = 50.0;
pub const SCORE_SCALE: f64 = 15.0;

/// Whether a higher slope should produce a higher or a lower score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Growth scores high.
    Direct,
    /// Decline scores high; used for physical retail, where shrinking store
    /// employment signals displacement.
    Inverted,
}

/// Scores each state's slope relative to all other states.
///
/// `score = clamp(50 + z * 15, 0, 100)` with `z` taken against the population
/// mean and standard deviation of `slopes`, negated for
/// [`Orientation::Inverted`]. A zero standard deviation is not guarded: the
/// resulting NaN scores pass through unchanged.
pub fn normalize_scores(slopes: &HashMap<String, f64>, orientation: Orientation) -> HashMap<String, f64> {
    let values: Vec<f64> = slopes.values().copied().collect();
    let avg = mean(&values);
    let sd = stddev(&values, avg);

    slopes
        .iter()
        .map(|(state, slope)| {
            let z = (slope - avg) / sd;
            let component = match orientation {
                Orientation::Direct => z,
                Orientation::Inverted => -z,
            };
            (state.clone(), (SCORE_CENTER + component * SCORE_SCALE).clamp(0.0, 100.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slopes(raw: &[(&str, f64)]) -> HashMap<String, f64> {
        raw.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn test_inverted_scores_reward_decline() {
        let scores = normalize_scores(&slopes(&[("A", 1.0), ("B", -1.0)]), Orientation::Inverted);
        assert!(scores["A"] < scores["B"]);
        assert_eq!(scores["A"], 35.0);
        assert_eq!(scores["B"], 65.0);
    }

    #[test]
    fn test_direct_scores_reward_growth() {
        let scores = normalize_scores(&slopes(&[("A", 1.0), ("B", -1.0)]), Orientation::Direct);
        assert_eq!(scores["A"], 65.0);
        assert_eq!(scores["B"], 35.0);
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut raw = vec![("OUT", 100.0)];
        let names: Vec<String> = (0..30).map(|i| format!("S{i}")).collect();
        raw.extend(names.iter().map(|n| (n.as_str(), 0.0)));

        let scores = normalize_scores(&slopes(&raw), Orientation::Direct);
        assert_eq!(scores["OUT"], 100.0);
        assert!(scores.values().all(|s| (0.0..=100.0).contains(s)));
    }

    #[test]
    fn test_zero_variance_is_unguarded() {
        let scores = normalize_scores(&slopes(&[("A", 0.3), ("B", 0.3)]), Orientation::Inverted);
        assert!(scores["A"].is_nan());
        assert!(scores["B"].is_nan());
    }
}
