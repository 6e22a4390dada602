//! Statistics kernel: pure functions over finite sequences of reals.
//!
//! Every function here is stateless. The outlier filters return kept-index
//! sets so callers can carry whole observations through the pipeline.

/// Arithmetic mean. Callers must check for empty input.
pub fn mean(xs: &[f64]) -> f64 {
    debug_assert!(!xs.is_empty(), "mean of empty sequence");
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation. Zero when fewer than two values or when
/// all values are equal.
pub fn stddev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Quantile via sorted copy and linear interpolation between order
/// statistics. `q` must be in [0, 1]. Callers must check for empty input.
pub fn quantile(xs: &[f64], q: f64) -> f64 {
    debug_assert!(!xs.is_empty(), "quantile of empty sequence");
    debug_assert!((0.0..=1.0).contains(&q), "quantile fraction out of range");

    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Indices of values within `threshold` standard deviations of the mean.
///
/// Degenerate inputs (fewer than 3 values, or zero spread) keep everything.
pub fn zscore_filter(xs: &[f64], threshold: f64) -> Vec<usize> {
    if xs.len() < 3 {
        return (0..xs.len()).collect();
    }
    let m = mean(xs);
    let sd = stddev(xs);
    if sd == 0.0 {
        return (0..xs.len()).collect();
    }
    xs.iter()
        .enumerate()
        .filter(|(_, x)| ((*x - m) / sd).abs() <= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Indices of values inside the interquartile fence
/// [Q1 - multiplier*IQR, Q3 + multiplier*IQR].
///
/// Fewer than 4 values keeps everything.
pub fn iqr_filter(xs: &[f64], multiplier: f64) -> Vec<usize> {
    if xs.len() < 4 {
        return (0..xs.len()).collect();
    }
    let q1 = quantile(xs, 0.25);
    let q3 = quantile(xs, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;
    xs.iter()
        .enumerate()
        .filter(|(_, x)| **x >= lower && **x <= upper)
        .map(|(i, _)| i)
        .collect()
}
