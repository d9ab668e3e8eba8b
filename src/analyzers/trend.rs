//! Linear trend fitting over yearly LQ values.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Category, StateYearRecord};

/// One observation fed to the slope estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub year: i32,
    pub retail_lq: f64,
}

impl TrendPoint {
    pub fn new(year: i32, retail_lq: f64) -> Self {
        Self { year, retail_lq }
    }
}

/// Ordinary least-squares slope of LQ against year.
///
/// Points with a non-positive LQ are dropped first. Years are shifted so the
/// earliest one is zero. Fewer than two usable points give 0. If every usable
/// point shares one year the denominator is zero and the result is NaN.
pub fn slope(points: &[TrendPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let mut usable: Vec<TrendPoint> = points.iter().copied().filter(|p| p.retail_lq > 0.0).collect();
    usable.sort_by_key(|p| p.year);

    if usable.len() < 2 {
        return 0.0;
    }

    let base_year = usable[0].year;
    let n = usable.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);

    for p in &usable {
        let x = f64::from(p.year - base_year);
        let y = p.retail_lq;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x)
}

/// Combined trend of one category for one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryTrend {
    pub slope: f64,
    /// Points used across all eligible industry codes.
    pub data_points: usize,
    /// Industry codes with enough history to fit.
    pub codes: usize,
}

/// Fits every industry code with at least two yearly values and averages the
/// slopes weighted by each code's number of points.
pub fn weighted_slope(records: &[StateYearRecord], category: Category) -> CategoryTrend {
    // BTreeMap keeps the summation order stable between runs.
    let mut series: BTreeMap<&str, Vec<TrendPoint>> = BTreeMap::new();
    for record in records {
        for (code, lq) in record.codes(category) {
            series
                .entry(code.as_str())
                .or_default()
                .push(TrendPoint::new(record.year, *lq));
        }
    }

    let mut weighted_sum = 0.0;
    let mut data_points = 0;
    let mut codes = 0;

    for points in series.values().filter(|points| points.len() >= 2) {
        weighted_sum += slope(points) * points.len() as f64;
        data_points += points.len();
        codes += 1;
    }

    let slope = if data_points == 0 {
        0.0
    } else {
        weighted_sum / data_points as f64
    };

    CategoryTrend {
        slope,
        data_points,
        codes,
    }
}

/// Distinct years covered by the records.
pub fn years_covered(records: &[StateYearRecord]) -> usize {
    records.iter().map(|r| r.year).collect::<BTreeSet<_>>().len()
}
