//! CalTRACK usage-per-day model.
//!
//! Candidate models (intercept only, cooling only, heating only, cooling and
//! heating) are fit by OLS over a grid of balance points; the qualified
//! candidate with the best adjusted R² is selected.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display};
use tracing::{debug, info, warn};

use super::metrics::ModelMetrics;
use super::model::{ModelPrediction, ModelStatus};
use super::ols::ols;
use super::series::{Aggregation, Frequency, TimeSeries};
use super::{finite, ModelWarning};

/// Balance points searched for heating and cooling degree days (°F).
pub const BALANCE_POINTS: std::ops::RangeInclusive<i32> = 30..=90;

/// Minimum hourly temperature readings for a day to get a mean temperature.
pub const MIN_HOURS_PER_DAY: usize = 12;

pub const NO_CANDIDATES_WARNING: &str = "eemeter.caltrack_daily.select_best_candidate.no_candidates";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyDesignRow {
    pub day: DateTime<Utc>,
    pub meter_value: Option<f64>,
    pub temperature_mean: Option<f64>,
}

impl DailyDesignRow {
    pub fn cdd(&self, balance_point: f64) -> Option<f64> {
        self.temperature_mean.map(|t| (t - balance_point).max(0.0))
    }

    pub fn hdd(&self, balance_point: f64) -> Option<f64> {
        self.temperature_mean.map(|t| (balance_point - t).max(0.0))
    }

    fn is_complete(&self) -> bool {
        self.meter_value.is_some() && self.temperature_mean.is_some()
    }
}

/// One row per day. Degree-day columns are derived on demand per balance point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyDesignMatrix {
    pub rows: Vec<DailyDesignRow>,
}

impl DailyDesignMatrix {
    pub fn n_days_kept(&self) -> usize {
        self.rows.iter().filter(|r| r.is_complete()).count()
    }

    pub fn n_days_dropped(&self) -> usize {
        self.rows.len() - self.n_days_kept()
    }
}

/// Daily mean temperatures keyed by day start, for days with enough hourly readings.
pub fn daily_temperature_means(temperature: &TimeSeries) -> BTreeMap<DateTime<Utc>, f64> {
    let mut days: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for point in temperature.resample(Frequency::Hourly, Aggregation::Mean).iter() {
        if let Some(t) = point.value {
            let day = days
                .entry(Frequency::Daily.floor(point.timestamp))
                .or_insert((0.0, 0));
            day.0 += t;
            day.1 += 1;
        }
    }
    days.into_iter()
        .filter(|(_, (_, n))| *n >= MIN_HOURS_PER_DAY)
        .map(|(day, (sum, n))| (day, sum / n as f64))
        .collect()
}

pub fn create_caltrack_daily_design_matrix(
    meter_data: &TimeSeries,
    temperature_data: &TimeSeries,
) -> DailyDesignMatrix {
    let temps = daily_temperature_means(temperature_data);
    let rows = meter_data
        .resample(Frequency::Daily, Aggregation::Sum)
        .iter()
        .map(|p| DailyDesignRow {
            day: p.timestamp,
            meter_value: p.value,
            temperature_mean: temps.get(&p.timestamp).copied(),
        })
        .collect();
    DailyDesignMatrix { rows }
}

/// Fit options, stored with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFitSettings {
    pub fit_cdd: bool,
    pub fit_intercept_only: bool,
    pub fit_cdd_only: bool,
    pub fit_hdd_only: bool,
    pub fit_cdd_hdd: bool,
    pub minimum_non_zero_cdd: usize,
    pub minimum_non_zero_hdd: usize,
    pub minimum_total_cdd: f64,
    pub minimum_total_hdd: f64,
    pub beta_cdd_maximum_p_value: f64,
    pub beta_hdd_maximum_p_value: f64,
}

impl Default for DailyFitSettings {
    fn default() -> Self {
        Self {
            fit_cdd: true,
            fit_intercept_only: true,
            fit_cdd_only: true,
            fit_hdd_only: true,
            fit_cdd_hdd: true,
            minimum_non_zero_cdd: 10,
            minimum_non_zero_hdd: 10,
            minimum_total_cdd: 20.0,
            minimum_total_hdd: 20.0,
            beta_cdd_maximum_p_value: 0.1,
            beta_hdd_maximum_p_value: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CandidateType {
    InterceptOnly,
    CddOnly,
    HddOnly,
    CddHdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CandidateStatus {
    Qualified,
    Disqualified,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateParams {
    pub intercept: f64,
    pub beta_cdd: Option<f64>,
    pub beta_hdd: Option<f64>,
    pub cooling_balance_point: Option<i32>,
    pub heating_balance_point: Option<i32>,
}

/// Usage per day split into its components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyLoads {
    pub base: f64,
    pub heating: f64,
    pub cooling: f64,
}

impl DailyLoads {
    pub fn total(&self) -> f64 {
        self.base + self.heating + self.cooling
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePerDayCandidate {
    pub model_type: CandidateType,
    pub formula: String,
    pub status: CandidateStatus,
    pub model_params: Option<CandidateParams>,
    pub r_squared_adj: Option<f64>,
    #[serde(default)]
    pub warnings: Vec<ModelWarning>,
}

impl UsagePerDayCandidate {
    pub fn predict_day(&self, temperature_mean: f64) -> Option<DailyLoads> {
        let params = self.model_params.as_ref()?;
        let cooling = match (params.beta_cdd, params.cooling_balance_point) {
            (Some(beta), Some(bp)) => beta * (temperature_mean - bp as f64).max(0.0),
            _ => 0.0,
        };
        let heating = match (params.beta_hdd, params.heating_balance_point) {
            (Some(beta), Some(bp)) => beta * (bp as f64 - temperature_mean).max(0.0),
            _ => 0.0,
        };
        Some(DailyLoads {
            base: params.intercept,
            heating,
            cooling,
        })
    }

    fn num_parameters(&self) -> usize {
        self.model_params.as_ref().map_or(0, |p| {
            1 + p.beta_cdd.is_some() as usize + p.beta_hdd.is_some() as usize
        })
    }
}

/// Result of [`fit_caltrack_usage_per_day_model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePerDayModelResults {
    pub status: ModelStatus,
    pub method_name: String,
    pub interval: String,
    pub model: Option<UsagePerDayCandidate>,
    pub r_squared_adj: Option<f64>,
    /// Every candidate tried; only kept in memory (used for plotting).
    #[serde(skip)]
    pub candidates: Vec<UsagePerDayCandidate>,
    pub warnings: Vec<ModelWarning>,
    pub metadata: serde_json::Value,
    pub settings: DailyFitSettings,
    pub totals_metrics: Option<ModelMetrics>,
}

impl UsagePerDayModelResults {
    fn empty(status: ModelStatus, settings: &DailyFitSettings) -> Self {
        Self {
            status,
            method_name: "caltrack_usage_per_day".to_string(),
            interval: Frequency::Daily.to_string(),
            model: None,
            r_squared_adj: None,
            candidates: Vec::new(),
            warnings: Vec::new(),
            metadata: json!({}),
            settings: settings.clone(),
            totals_metrics: None,
        }
    }

    /// Predicted usage for each timestamp of `index`, one day per timestamp.
    pub fn predict(&self, index: &[DateTime<Utc>], temperature: &TimeSeries) -> Vec<ModelPrediction> {
        let temps = daily_temperature_means(temperature);
        index
            .iter()
            .map(|ts| {
                let loads = self.model.as_ref().and_then(|m| {
                    let t = temps.get(&Frequency::Daily.floor(*ts))?;
                    m.predict_day(*t)
                });
                ModelPrediction {
                    timestamp: *ts,
                    predicted_usage: loads.map(|l| l.total()),
                    base_load: loads.map(|l| l.base),
                    heating_load: loads.map(|l| l.heating),
                    cooling_load: loads.map(|l| l.cooling),
                }
            })
            .collect()
    }
}

pub fn fit_caltrack_usage_per_day_model(
    design_matrix: &DailyDesignMatrix,
    settings: &DailyFitSettings,
) -> UsagePerDayModelResults {
    let rows: Vec<&DailyDesignRow> = design_matrix.rows.iter().filter(|r| r.is_complete()).collect();

    if rows.is_empty() {
        warn!("no complete days in daily design matrix");
        let mut results = UsagePerDayModelResults::empty(ModelStatus::NoData, settings);
        results.warnings.push(ModelWarning::new(
            "eemeter.caltrack_usage_per_day.no_data",
            "No data available. Cannot fit model.",
            json!({}),
        ));
        return results;
    }

    let mut candidates = Vec::new();
    if settings.fit_intercept_only {
        candidates.push(fit_intercept_only(&rows));
    }

    let cooling_points = sufficient_balance_points(
        &rows,
        DailyDesignRow::cdd,
        settings.minimum_non_zero_cdd,
        settings.minimum_total_cdd,
    );
    let heating_points = sufficient_balance_points(
        &rows,
        DailyDesignRow::hdd,
        settings.minimum_non_zero_hdd,
        settings.minimum_total_hdd,
    );
    debug!(
        cooling = cooling_points.len(),
        heating = heating_points.len(),
        "sufficient balance points"
    );

    if settings.fit_cdd && settings.fit_cdd_only {
        for &bp in &cooling_points {
            candidates.push(fit_candidate(&rows, Some(bp), None, settings));
        }
    }
    if settings.fit_hdd_only {
        for &bp in &heating_points {
            candidates.push(fit_candidate(&rows, None, Some(bp), settings));
        }
    }
    if settings.fit_cdd && settings.fit_cdd_hdd {
        for &cdd_bp in &cooling_points {
            for &hdd_bp in heating_points.iter().filter(|&&h| h <= cdd_bp) {
                candidates.push(fit_candidate(&rows, Some(cdd_bp), Some(hdd_bp), settings));
            }
        }
    }

    let metadata = json!({
        "n_days_kept": design_matrix.n_days_kept(),
        "n_days_dropped": design_matrix.n_days_dropped(),
        "baseline_start": rows.first().map(|r| r.day),
        "baseline_end": rows.last().map(|r| r.day),
    });

    let Some(best) = select_best_candidate(&candidates) else {
        let mut status_count: BTreeMap<String, usize> = BTreeMap::new();
        for c in &candidates {
            *status_count
                .entry(format!("status_count:{}", c.status))
                .or_default() += 1;
        }
        warn!(candidates = candidates.len(), "no qualified daily model candidates");
        let mut results = UsagePerDayModelResults::empty(ModelStatus::NoModel, settings);
        results.warnings.push(ModelWarning::new(
            NO_CANDIDATES_WARNING,
            "No qualified model candidates available.",
            json!(status_count),
        ));
        results.metadata = metadata;
        results.candidates = candidates;
        return results;
    };

    let observed: Vec<Option<f64>> = rows.iter().map(|r| r.meter_value).collect();
    let predicted: Vec<Option<f64>> = rows
        .iter()
        .map(|r| r.temperature_mean.and_then(|t| best.predict_day(t)).map(|l| l.total()))
        .collect();
    let totals_metrics = ModelMetrics::compute(&observed, &predicted, best.num_parameters());

    info!(
        model_type = %best.model_type,
        formula = %best.formula,
        candidates = candidates.len(),
        "selected daily model candidate"
    );

    let mut results = UsagePerDayModelResults::empty(ModelStatus::Success, settings);
    results.r_squared_adj = best.r_squared_adj;
    results.model = Some(best);
    results.candidates = candidates;
    results.metadata = metadata;
    results.totals_metrics = totals_metrics;
    results
}

fn sufficient_balance_points(
    rows: &[&DailyDesignRow],
    degree_days: fn(&DailyDesignRow, f64) -> Option<f64>,
    minimum_non_zero: usize,
    minimum_total: f64,
) -> Vec<i32> {
    BALANCE_POINTS
        .filter(|&bp| {
            let values: Vec<f64> = rows.iter().filter_map(|r| degree_days(r, bp as f64)).collect();
            let non_zero = values.iter().filter(|v| **v > 0.0).count();
            let total: f64 = values.iter().sum();
            non_zero >= minimum_non_zero && total >= minimum_total
        })
        .collect()
}

fn fit_intercept_only(rows: &[&DailyDesignRow]) -> UsagePerDayCandidate {
    let n = rows.len() as f64;
    let mean = rows.iter().filter_map(|r| r.meter_value).sum::<f64>() / n;
    UsagePerDayCandidate {
        model_type: CandidateType::InterceptOnly,
        formula: "meter_value ~ 1".to_string(),
        status: CandidateStatus::Qualified,
        model_params: Some(CandidateParams {
            intercept: mean,
            ..Default::default()
        }),
        r_squared_adj: Some(0.0),
        warnings: Vec::new(),
    }
}

fn fit_candidate(
    rows: &[&DailyDesignRow],
    cdd_bp: Option<i32>,
    hdd_bp: Option<i32>,
    settings: &DailyFitSettings,
) -> UsagePerDayCandidate {
    let model_type = match (cdd_bp, hdd_bp) {
        (Some(_), Some(_)) => CandidateType::CddHdd,
        (Some(_), None) => CandidateType::CddOnly,
        (None, Some(_)) => CandidateType::HddOnly,
        (None, None) => CandidateType::InterceptOnly,
    };
    let mut terms = Vec::new();
    if let Some(bp) = cdd_bp {
        terms.push(format!("cdd_{}", bp));
    }
    if let Some(bp) = hdd_bp {
        terms.push(format!("hdd_{}", bp));
    }
    let formula = format!("meter_value ~ {}", terms.join(" + "));

    let n = rows.len();
    let k = 1 + terms.len();
    let x = DMatrix::from_fn(n, k, |i, j| {
        let row = rows[i];
        match (j, cdd_bp) {
            (0, _) => 1.0,
            (1, Some(bp)) => row.cdd(bp as f64).unwrap_or(0.0),
            _ => row.hdd(hdd_bp.unwrap_or_default() as f64).unwrap_or(0.0),
        }
    });
    let y = DVector::from_iterator(n, rows.iter().map(|r| r.meter_value.unwrap_or(0.0)));

    let fit = match ols(&x, &y) {
        Ok(fit) => fit,
        Err(e) => {
            return UsagePerDayCandidate {
                model_type,
                formula,
                status: CandidateStatus::Error,
                model_params: None,
                r_squared_adj: None,
                warnings: vec![ModelWarning::new(
                    format!("eemeter.caltrack_daily.{}.model_results", model_type),
                    format!("Error encountered in statsmodels.formula.api.ols method: {}", e),
                    json!({}),
                )],
            }
        }
    };

    let mut params = CandidateParams {
        intercept: fit.params[0],
        cooling_balance_point: cdd_bp,
        heating_balance_point: hdd_bp,
        ..Default::default()
    };
    let mut warnings = Vec::new();
    let mut slope = |name: &str, index: usize, max_p: f64| {
        let beta = fit.params[index];
        let p_value = fit.p_values[index];
        if p_value.map_or(true, |p| p > max_p) {
            warnings.push(ModelWarning::new(
                format!("eemeter.caltrack_daily.{}.{}_p_value_too_high", model_type, name),
                format!("Model fit {} p-value is too high. Candidate model rejected.", name),
                json!({ name: beta, format!("{}_p_value", name): p_value, format!("{}_maximum_p_value", name): max_p }),
            ));
        }
        if beta <= 0.0 {
            warnings.push(ModelWarning::new(
                format!("eemeter.caltrack_daily.{}.{}_negative", model_type, name),
                format!("Model fit {} parameter is negative. Candidate model rejected.", name),
                json!({ name: beta }),
            ));
        }
        beta
    };
    if cdd_bp.is_some() {
        params.beta_cdd = Some(slope("beta_cdd", 1, settings.beta_cdd_maximum_p_value));
    }
    if hdd_bp.is_some() {
        let index = if cdd_bp.is_some() { 2 } else { 1 };
        params.beta_hdd = Some(slope("beta_hdd", index, settings.beta_hdd_maximum_p_value));
    }

    UsagePerDayCandidate {
        model_type,
        formula,
        status: if warnings.is_empty() {
            CandidateStatus::Qualified
        } else {
            CandidateStatus::Disqualified
        },
        model_params: Some(params),
        r_squared_adj: finite(fit.r_squared_adj),
        warnings,
    }
}

/// Qualified candidate with the highest adjusted R²; ties keep the earliest.
pub fn select_best_candidate(candidates: &[UsagePerDayCandidate]) -> Option<UsagePerDayCandidate> {
    candidates
        .iter()
        .filter(|c| c.status == CandidateStatus::Qualified)
        .fold(None::<&UsagePerDayCandidate>, |best, c| match best {
            Some(b) if b.r_squared_adj.unwrap_or(f64::MIN) >= c.r_squared_adj.unwrap_or(f64::MIN) => {
                Some(b)
            }
            _ => Some(c),
        })
        .cloned()
}
