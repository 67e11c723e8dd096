//! Metered savings over a reporting period with ASHRAE Guideline 14 error bands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, warn};

use super::metrics::ModelMetrics;
use super::model::BaselineModel;
use super::series::{Frequency, TimeSeries};
use super::finite;

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.90;

// Fractional savings uncertainty polynomial in reporting months.
const FSU_A: f64 = -0.00024;
const FSU_B: f64 = 0.03535;
const FSU_C: f64 = 1.00286;

/// Savings for one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsRow {
    pub timestamp: DateTime<Utc>,
    pub reporting_observed: Option<f64>,
    pub counterfactual_usage: Option<f64>,
    /// `counterfactual_usage - reporting_observed`
    pub metered_savings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual_base_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual_heating_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual_cooling_load: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorBands {
    #[serde(rename = "FSU Error Band", default, skip_serializing_if = "Option::is_none")]
    pub fsu: Option<f64>,
    #[serde(rename = "OLS Error Band")]
    pub ols: f64,
    #[serde(rename = "OLS Error Band: Model Error")]
    pub ols_model: f64,
    #[serde(rename = "OLS Error Band: Noise")]
    pub ols_noise: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeteredSavings {
    pub rows: Vec<SavingsRow>,
    pub error_bands: Option<ErrorBands>,
}

impl MeteredSavings {
    /// Sum of the defined savings values.
    pub fn total_savings(&self) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.metered_savings)
            .filter(|s| !s.is_nan())
            .sum()
    }
}

/// Predicts the counterfactual over the reporting index and compares it with
/// the observed usage.
pub fn metered_savings(
    model: &BaselineModel,
    reporting_meter_data: &TimeSeries,
    temperature_data: &TimeSeries,
    with_disaggregated: bool,
    confidence_level: f64,
) -> MeteredSavings {
    let index = reporting_meter_data.timestamps();
    let predictions = model.predict(&index, temperature_data);

    let rows: Vec<SavingsRow> = reporting_meter_data
        .iter()
        .zip(predictions)
        .map(|(point, prediction)| {
            let counterfactual_usage = prediction.predicted_usage;
            let metered_savings = match (counterfactual_usage, point.value) {
                (Some(c), Some(o)) => finite(c - o),
                _ => None,
            };
            let disaggregated = |load: Option<f64>| if with_disaggregated { load } else { None };
            SavingsRow {
                timestamp: point.timestamp,
                reporting_observed: point.value,
                counterfactual_usage,
                metered_savings,
                counterfactual_base_load: disaggregated(prediction.base_load),
                counterfactual_heating_load: disaggregated(prediction.heating_load),
                counterfactual_cooling_load: disaggregated(prediction.cooling_load),
            }
        })
        .collect();

    let error_bands = model
        .totals_metrics()
        .and_then(|metrics| error_bands(metrics, &rows, model.frequency(), confidence_level));
    debug!(
        rows = rows.len(),
        with_error_bands = error_bands.is_some(),
        "computed metered savings"
    );

    MeteredSavings { rows, error_bands }
}

fn error_bands(
    metrics: &ModelMetrics,
    rows: &[SavingsRow],
    interval: Frequency,
    confidence_level: f64,
) -> Option<ErrorBands> {
    let base_obs = metrics.observed_length as f64;
    let observed: Vec<f64> = rows.iter().filter_map(|r| r.reporting_observed).collect();
    let post_obs = observed.len() as f64;
    let base_avg = metrics.observed_mean?;

    if post_obs == 0.0 || base_avg == 0.0 || base_obs == 0.0 {
        return None;
    }

    let post_avg = observed.iter().sum::<f64>() / post_obs;
    let base_var = metrics.observed_variance?;
    let rmse_adj = metrics.rmse_adj?;
    let autocorr = metrics.autocorr_resid.unwrap_or(0.0);

    let df = base_obs - metrics.num_parameters as f64;
    let single_tailed = 1.0 - (1.0 - confidence_level) / 2.0;
    let t_stat = match StudentsT::new(0.0, 1.0, df) {
        Ok(t) => t.inverse_cdf(single_tailed),
        Err(e) => {
            warn!(df, error = %e, "cannot compute error bands");
            return None;
        }
    };
    let nprime = base_obs * (1.0 - autocorr) / (1.0 + autocorr);

    let ols_model = t_stat * rmse_adj * post_obs / base_obs.sqrt()
        * (1.0 + (base_avg - post_avg).powi(2) / base_var).sqrt();
    let ols_noise = t_stat * rmse_adj * (post_obs * base_obs / nprime).sqrt();
    let ols = (ols_model.powi(2) + ols_noise.powi(2)).sqrt();

    let fsu = match interval {
        Frequency::Daily => {
            let total_base_energy: f64 = rows.iter().filter_map(|r| r.counterfactual_usage).sum();
            let months = post_obs / 30.0;
            finite(
                total_base_energy
                    * t_stat
                    * (FSU_A * months.powi(2) + FSU_B * months + FSU_C)
                    * (rmse_adj / base_avg)
                    * ((base_obs / nprime) * (1.0 + 2.0 / nprime) * (1.0 / post_obs)).sqrt(),
            )
        }
        Frequency::Hourly => None,
    };

    Some(ErrorBands {
        fsu,
        ols: finite(ols)?,
        ols_model: finite(ols_model)?,
        ols_noise: finite(ols_noise)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caltrack::daily::{
        create_caltrack_daily_design_matrix, fit_caltrack_usage_per_day_model, DailyFitSettings,
    };
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    }

    fn temperature(day: i64) -> f64 {
        50.0 + 30.0 * (day as f64 / 365.0 * std::f64::consts::TAU).sin()
    }

    // Hourly temperatures and daily usage with heating below 55 °F; the
    // second year uses `scale` of the baseline consumption.
    fn dataset(scale: f64) -> (TimeSeries, TimeSeries) {
        let temps = TimeSeries::from_points((0..730 * 24).map(|h| {
            let day = h / 24;
            (start() + Duration::hours(h), Some(temperature(day)))
        }));
        let meter = TimeSeries::from_points((0..730).map(|d| {
            let jitter = ((d * 7) % 5) as f64 * 0.3 - 0.6;
            let usage = 20.0 + 1.5 * (55.0 - temperature(d)).max(0.0) + jitter;
            let usage = if d >= 365 { usage * scale } else { usage };
            (start() + Duration::days(d), Some(usage))
        }));
        (meter, temps)
    }

    fn daily_model(meter: &TimeSeries, temps: &TimeSeries) -> BaselineModel {
        let baseline = meter.between(None, Some(start() + Duration::days(364)));
        let dm = create_caltrack_daily_design_matrix(&baseline, temps);
        BaselineModel::UsagePerDay(fit_caltrack_usage_per_day_model(&dm, &DailyFitSettings::default()))
    }

    #[test]
    fn test_savings_are_counterfactual_minus_observed() {
        let (meter, temps) = dataset(0.9);
        let model = daily_model(&meter, &temps);
        let reporting = meter.between(Some(start() + Duration::days(365)), None);

        let savings = metered_savings(&model, &reporting, &temps, true, DEFAULT_CONFIDENCE_LEVEL);

        assert_eq!(savings.rows.len(), 365);
        for row in &savings.rows {
            let expected = row.counterfactual_usage.unwrap() - row.reporting_observed.unwrap();
            assert!((row.metered_savings.unwrap() - expected).abs() < 1e-9);
            assert!(row.counterfactual_base_load.is_some());
        }
        // Consumption dropped by 10 %, so savings are positive.
        assert!(savings.total_savings() > 0.0);
        let bands = savings.error_bands.unwrap();
        assert!(bands.fsu.unwrap() > 0.0);
        assert!(bands.ols >= bands.ols_model && bands.ols >= bands.ols_noise);
    }

    #[test]
    fn test_without_disaggregation_loads_are_absent() {
        let (meter, temps) = dataset(1.0);
        let model = daily_model(&meter, &temps);
        let reporting = meter.between(Some(start() + Duration::days(365)), None);

        let savings = metered_savings(&model, &reporting, &temps, false, DEFAULT_CONFIDENCE_LEVEL);
        assert!(savings.rows.iter().all(|r| r.counterfactual_base_load.is_none()));
        assert!(savings.total_savings().abs() < 365.0);
    }

    #[test]
    fn test_missing_temperature_leaves_savings_undefined() {
        let (meter, temps) = dataset(1.0);
        let model = daily_model(&meter, &temps);
        let beyond = TimeSeries::from_points(vec![(start() + Duration::days(800), Some(10.0))]);

        let savings = metered_savings(&model, &beyond, &temps, true, DEFAULT_CONFIDENCE_LEVEL);
        assert_eq!(savings.rows[0].metered_savings, None);
        assert_eq!(savings.total_savings(), 0.0);
    }

    #[test]
    fn test_error_bands_serialize_with_labels() {
        let bands = ErrorBands {
            fsu: None,
            ols: 5.0,
            ols_model: 3.0,
            ols_noise: 4.0,
        };
        let json = serde_json::to_value(bands).unwrap();
        assert_eq!(json["OLS Error Band"], 5.0);
        assert_eq!(json["OLS Error Band: Noise"], 4.0);
        assert!(json.get("FSU Error Band").is_none());
    }
}
