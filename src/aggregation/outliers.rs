//! Shared outlier pipeline: z-score first, then IQR over the survivors.
//!
//! The second pass recomputes quartiles on the z-score survivors, so an
//! observation that was not quite a z-score outlier can still fall to the
//! IQR fence. That two-pass behavior is deliberate.

use crate::config::AggregationConfig;
use crate::stats;
use crate::types::Observation;

/// Returns the surviving observations and the number removed.
///
/// Snapshots smaller than `min_data_points` are passed through unfiltered.
pub fn filter_outliers(
    observations: &[Observation],
    config: &AggregationConfig,
) -> (Vec<Observation>, usize) {
    if observations.len() < config.min_data_points {
        return (observations.to_vec(), 0);
    }

    let prices: Vec<f64> = observations.iter().map(|o| o.price).collect();

    let z_kept = stats::zscore_filter(&prices, config.z_score_threshold);
    let z_survivors: Vec<Observation> =
        z_kept.iter().map(|&i| observations[i].clone()).collect();
    let z_prices: Vec<f64> = z_kept.iter().map(|&i| prices[i]).collect();

    let iqr_kept = stats::iqr_filter(&z_prices, config.iqr_multiplier);
    let survivors: Vec<Observation> =
        iqr_kept.iter().map(|&i| z_survivors[i].clone()).collect();

    let removed = observations.len() - survivors.len();
    (survivors, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;

    fn obs(price: f64) -> Observation {
        Observation::new(price, 1_000, "okx")
    }

    #[test]
    fn test_small_snapshot_unfiltered() {
        let config = AggregationConfig::default();
        let observations = vec![obs(100.0), obs(500.0)];
        let (kept, removed) = filter_outliers(&observations, &config);
        assert_eq!(kept.len(), 2);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_gross_outlier_removed() {
        let config = AggregationConfig::default();
        let observations = vec![
            obs(177.50),
            obs(177.45),
            obs(177.55),
            obs(177.48),
            obs(177.52),
            obs(500.0),
        ];
        let (kept, removed) = filter_outliers(&observations, &config);
        assert_eq!(removed, 1);
        assert!(kept.iter().all(|o| o.price < 200.0));
    }

    #[test]
    fn test_iqr_catches_what_zscore_tolerates() {
        // One moderate straggler in a very tight cluster: z-score keeps it
        // (the straggler inflates sigma), the IQR fence on the survivors
        // does not.
        let config = AggregationConfig {
            z_score_threshold: 3.0,
            iqr_multiplier: 1.5,
            ..AggregationConfig::default()
        };
        let observations = vec![
            obs(100.00),
            obs(100.01),
            obs(100.02),
            obs(100.01),
            obs(100.00),
            obs(100.02),
            obs(100.01),
            obs(100.00),
            obs(100.60),
        ];
        let (kept, removed) = filter_outliers(&observations, &config);
        assert_eq!(removed, 1);
        assert!(kept.iter().all(|o| o.price < 100.5));
    }
}
