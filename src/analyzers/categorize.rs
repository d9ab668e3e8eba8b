use crate::types::Trend;

/// Slopes within `±TREND_THRESHOLD` LQ per year count as stable.
pub const TREND_THRESHOLD: f64 = 0.02;

/// Converts a fitted slope into a trend label.
///
/// | Slope              | Trend     |
/// |--------------------|-----------|
/// | < -threshold       | declining |
/// | -threshold..=+thr. | stable    |
/// | > +threshold       | growing   |
///
/// NaN compares false both ways and lands in stable.
pub fn categorize(slope: f64, threshold: f64) -> Trend {
    match slope {
        s if s < -threshold => Trend::Declining,
        s if s > threshold => Trend::Growing,
        _ => Trend::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_boundaries() {
        let t = TREND_THRESHOLD;
        assert_eq!(categorize(t, t), Trend::Stable);
        assert_eq!(categorize(-t, t), Trend::Stable);
        assert_eq!(categorize(0.0, t), Trend::Stable);
        assert_eq!(categorize(t + 1e-9, t), Trend::Growing);
        assert_eq!(categorize(-t - 1e-9, t), Trend::Declining);
        assert_eq!(categorize(1.5, t), Trend::Growing);
        assert_eq!(categorize(-1.5, t), Trend::Declining);
    }

    #[test]
    fn test_categorize_nan_is_stable() {
        assert_eq!(categorize(f64::NAN, TREND_THRESHOLD), Trend::Stable);
    }
}
