//! Goodness-of-fit metrics for a baseline model over its baseline period.

use serde::{Deserialize, Serialize};

use super::finite;

/// Fit statistics of observed vs predicted usage.
///
/// Undefined statistics (for example cvrmse with a zero mean) are `None` so
/// that the metrics survive a JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub observed_length: usize,
    pub predicted_length: usize,
    pub merged_length: usize,
    pub num_parameters: usize,
    pub observed_mean: Option<f64>,
    pub observed_variance: Option<f64>,
    pub r_squared: Option<f64>,
    pub r_squared_adj: Option<f64>,
    pub rmse: Option<f64>,
    pub rmse_adj: Option<f64>,
    pub cvrmse: Option<f64>,
    pub cvrmse_adj: Option<f64>,
    pub mape: Option<f64>,
    pub nmae: Option<f64>,
    pub nmbe: Option<f64>,
    pub autocorr_resid: Option<f64>,
}

impl ModelMetrics {
    /// Computes metrics over the intervals where both series have a value.
    /// Returns `None` when there is no such interval.
    pub fn compute(
        observed: &[Option<f64>],
        predicted: &[Option<f64>],
        num_parameters: usize,
    ) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = observed
            .iter()
            .zip(predicted)
            .filter_map(|(o, p)| Some(((*o)?, (*p)?)))
            .collect();
        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        let obs: Vec<f64> = pairs.iter().map(|(o, _)| *o).collect();
        let pred: Vec<f64> = pairs.iter().map(|(_, p)| *p).collect();
        let resid: Vec<f64> = pairs.iter().map(|(o, p)| o - p).collect();

        let observed_mean = obs.iter().sum::<f64>() / n;
        let observed_variance =
            obs.iter().map(|o| (o - observed_mean).powi(2)).sum::<f64>() / (n - 1.0);
        let ssr = resid.iter().map(|r| r * r).sum::<f64>();
        let observed_sum = obs.iter().sum::<f64>();

        let r_squared = pearson(&obs, &pred).map(|r| r * r);
        let r_squared_adj = r_squared
            .map(|r2| 1.0 - (1.0 - r2) * (n - 1.0) / (n - num_parameters as f64 - 1.0));
        let rmse = (ssr / n).sqrt();
        let rmse_adj = (ssr / (n - num_parameters as f64)).sqrt();

        let nonzero: Vec<(f64, f64)> = obs
            .iter()
            .zip(&resid)
            .filter(|(o, _)| **o != 0.0)
            .map(|(o, r)| (*o, *r))
            .collect();
        let mape = (!nonzero.is_empty()).then(|| {
            nonzero.iter().map(|(o, r)| (r / o).abs()).sum::<f64>() / nonzero.len() as f64
        });

        Some(Self {
            observed_length: observed.iter().filter(|o| o.is_some()).count(),
            predicted_length: predicted.iter().filter(|p| p.is_some()).count(),
            merged_length: pairs.len(),
            num_parameters,
            observed_mean: finite(observed_mean),
            observed_variance: finite(observed_variance),
            r_squared: r_squared.and_then(finite),
            r_squared_adj: r_squared_adj.and_then(finite),
            rmse: finite(rmse),
            rmse_adj: finite(rmse_adj),
            cvrmse: finite(rmse / observed_mean),
            cvrmse_adj: finite(rmse_adj / observed_mean),
            mape: mape.and_then(finite),
            nmae: finite(resid.iter().map(|r| r.abs()).sum::<f64>() / observed_sum),
            nmbe: finite(resid.iter().sum::<f64>() / observed_sum),
            autocorr_resid: (resid.len() > 2)
                .then(|| pearson(&resid[1..], &resid[..resid.len() - 1]))
                .flatten()
                .and_then(finite),
        })
    }
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - mean_a) * (y - mean_b)).sum();
    let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum();
    let var_b: f64 = b.iter().map(|y| (y - mean_b).powi(2)).sum();
    let denom = (var_a * var_b).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let observed = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let metrics = ModelMetrics::compute(&observed, &observed, 1).unwrap();

        assert_eq!(metrics.merged_length, 4);
        assert_eq!(metrics.observed_mean, Some(2.5));
        assert_eq!(metrics.rmse, Some(0.0));
        assert!((metrics.r_squared.unwrap() - 1.0).abs() < 1e-12);
        // Residuals are constant zero, correlation undefined.
        assert_eq!(metrics.autocorr_resid, None);
    }

    #[test]
    fn test_missing_values_are_not_merged() {
        let observed = vec![Some(1.0), None, Some(3.0), Some(5.0)];
        let predicted = vec![Some(1.5), Some(2.0), None, Some(4.0)];
        let metrics = ModelMetrics::compute(&observed, &predicted, 0).unwrap();

        assert_eq!(metrics.observed_length, 3);
        assert_eq!(metrics.predicted_length, 3);
        assert_eq!(metrics.merged_length, 2);
        assert_eq!(metrics.nmbe, Some((-0.5 + 1.0) / 6.0));
    }

    #[test]
    fn test_no_overlap_gives_none() {
        assert!(ModelMetrics::compute(&[Some(1.0), None], &[None, Some(1.0)], 0).is_none());
    }

    #[test]
    fn test_undefined_stats_serialize_as_null() {
        let metrics = ModelMetrics::compute(&[Some(0.0)], &[Some(0.0)], 0).unwrap();
        assert_eq!(metrics.cvrmse, None);
        let json = serde_json::to_value(&metrics).unwrap();
        let back: ModelMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(back, metrics);
    }
}
