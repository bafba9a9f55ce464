//! Descriptive statistics over plain `f64` slices.
//!
//! Empty input yields `0.0` everywhere so callers can report zeroed statistics
//! when a resource returned no data.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Sample standard deviation (n - 1 denominator); `0.0` for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `quantile` is in `[0, 1]`; values outside are clamped.
pub fn percentile(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = quantile.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(min(&[]), 0.0);
        assert_eq!(max(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(percentile(&[], 0.95), 0.0);
    }

    #[test]
    fn test_mean_min_max() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(mean(&values), 30.0);
        assert_eq!(min(&values), 10.0);
        assert_eq!(max(&values), 50.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [500.0, 100.0, 300.0, 200.0, 400.0];
        assert!((percentile(&values, 0.95) - 480.0).abs() < EPSILON);
        assert!((percentile(&values, 0.99) - 496.0).abs() < EPSILON);
        assert_eq!(percentile(&values, 0.5), 300.0);
        assert_eq!(percentile(&values, 0.0), 100.0);
        assert_eq!(percentile(&values, 1.0), 500.0);
        assert_eq!(percentile(&[42.0], 0.95), 42.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // population std-dev is 2.0; sample std-dev is sqrt(32 / 7)
        assert!((std_dev(&values) - (32.0f64 / 7.0).sqrt()).abs() < EPSILON);
        assert_eq!(std_dev(&[3.0]), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(33.33333, 1), 33.3);
    }
}
