//! Distribution statistics for a list of yield percentages.
//!
//! Everything here is a plain left-to-right reduction so the same input order
//! always produces bit-identical results.

use crate::domain::Histogram;

/// Number of fixed-width histogram bins over `[HISTOGRAM_MIN, HISTOGRAM_MAX]`.
pub const HISTOGRAM_BINS: usize = 10;
pub const HISTOGRAM_MIN: f64 = 0.0;
pub const HISTOGRAM_MAX: f64 = 100.0;

/// Control limits sit this many standard deviations from the mean.
pub const SIGMA_MULTIPLIER: f64 = 3.0;

/// Round to 2 decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu) * (v - mu)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// 3-sigma limits around a center line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLimits {
    pub ucl: f64,
    /// Floored at zero: a yield cannot be negative.
    pub lcl: f64,
}

pub fn control_limits(center: f64, std_dev: f64) -> ControlLimits {
    ControlLimits {
        ucl: center + SIGMA_MULTIPLIER * std_dev,
        lcl: (center - SIGMA_MULTIPLIER * std_dev).max(0.0),
    }
}

/// Bin edges `0, 10, ..., 100`.
pub fn histogram_edges() -> Vec<f64> {
    let width = (HISTOGRAM_MAX - HISTOGRAM_MIN) / HISTOGRAM_BINS as f64;
    (0..=HISTOGRAM_BINS)
        .map(|i| HISTOGRAM_MIN + i as f64 * width)
        .collect()
}

/// Tally values into fixed-width bins.
///
/// Bins are half-open `[lo, hi)` except the last, which also takes
/// `HISTOGRAM_MAX` so a 100% wafer is counted. Values outside the range
/// (and NaN) are not tallied.
pub fn histogram(values: &[f64]) -> Histogram {
    let edges = histogram_edges();
    let width = (HISTOGRAM_MAX - HISTOGRAM_MIN) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0u64; HISTOGRAM_BINS];

    for &v in values {
        if !(HISTOGRAM_MIN..=HISTOGRAM_MAX).contains(&v) {
            continue;
        }
        let mut idx = (((v - HISTOGRAM_MIN) / width).floor() as usize).min(HISTOGRAM_BINS - 1);
        // Guard against the division landing one bin off at an edge.
        if idx > 0 && v < edges[idx] {
            idx -= 1;
        } else if idx + 1 < HISTOGRAM_BINS && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    Histogram {
        counts,
        bins: edges.into_iter().map(round2).collect(),
    }
}

/// Rounded distribution summary of one yield list.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub average: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub histogram: Histogram,
    pub count: usize,
}

/// Summarize a yield list; `None` when the list is empty.
///
/// Limits are derived from the unrounded mean and deviation, then every
/// reported figure is rounded to 2dp.
pub fn summarize(values: &[f64]) -> Option<Distribution> {
    let average = mean(values)?;
    let std_dev = population_std_dev(values)?;
    let limits = control_limits(average, std_dev);

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(Distribution {
        average: round2(average),
        std_dev: round2(std_dev),
        min: round2(min),
        max: round2(max),
        ucl: round2(limits.ucl),
        lcl: round2(limits.lcl),
        histogram: histogram(values),
        count: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(96.0), 96.0);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(33.333_333), 33.33);
    }

    #[test]
    fn population_std_dev_divides_by_n() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert!((population_std_dev(&values).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[]), None);
        assert_eq!(population_std_dev(&[42.0]), Some(0.0));
    }

    #[test]
    fn lcl_is_floored_at_zero() {
        let limits = control_limits(10.0, 5.0);
        assert_eq!(limits.ucl, 25.0);
        assert_eq!(limits.lcl, 0.0);

        let limits = control_limits(95.0, 1.0);
        assert_eq!(limits.lcl, 92.0);
    }

    #[test]
    fn histogram_edges_and_boundaries() {
        let h = histogram(&[0.0, 9.99, 10.0, 55.5, 99.9, 100.0, -1.0, 100.5, f64::NAN]);
        assert_eq!(h.bins, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        assert_eq!(h.counts, vec![2, 1, 0, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn histogram_exact_edges_land_in_upper_bin() {
        let values: Vec<f64> = (0..10).map(|i| i as f64 * 10.0).collect();
        assert_eq!(histogram(&values).counts, vec![1; 10]);
    }

    #[test]
    fn summarize_matches_hand_computation() {
        let d = summarize(&[98.0, 94.0, 90.0]).unwrap();
        assert_eq!(d.average, 94.0);
        // sqrt(32/3) = 3.2659...
        assert_eq!(d.std_dev, 3.27);
        assert_eq!(d.min, 90.0);
        assert_eq!(d.max, 98.0);
        assert_eq!(d.ucl, 103.8);
        assert_eq!(d.lcl, 84.2);
        assert_eq!(d.count, 3);
        // 90.0 sits on the lower edge of the last bin.
        assert_eq!(d.histogram.counts[9], 3);
        assert_eq!(d.histogram.counts.iter().sum::<u64>(), 3);

        assert!(summarize(&[]).is_none());
    }
}
