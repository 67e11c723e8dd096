//! CalTRACK hourly model: time-of-week and temperature regression fit per
//! three-month weighted segment.
//!
//! Pipeline: preliminary design matrix, segmentation, hour-of-week occupancy,
//! temperature bins, segmented design matrices, one weighted fit per segment.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Timelike, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::metrics::ModelMetrics;
use super::model::{ModelPrediction, ModelStatus};
use super::ols::wls;
use super::segmentation::{segment_name, SegmentType, Segmentation};
use super::series::{Aggregation, Frequency, TimeSeries};
use super::ModelWarning;

pub const HOURS_PER_WEEK: usize = 168;
pub const OCCUPANCY_THRESHOLD: f64 = 0.65;
pub const DEFAULT_TEMPERATURE_BINS: [f64; 6] = [30.0, 45.0, 55.0, 65.0, 75.0, 90.0];
pub const MIN_TEMPERATURE_COUNT: usize = 20;

/// Monday 00:00 is 0, Sunday 23:00 is 167.
pub fn hour_of_week(ts: DateTime<Utc>) -> usize {
    ts.weekday().num_days_from_monday() as usize * 24 + ts.hour() as usize
}

fn hour_column(how: usize) -> String {
    format!("hour_of_week[{}]", how)
}

fn bin_column(bin: usize, occupied: bool) -> String {
    format!("bin_{}:{}", bin, if occupied { "occupied" } else { "unoccupied" })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreliminaryRow {
    pub timestamp: DateTime<Utc>,
    pub meter_value: Option<f64>,
    pub temperature_mean: Option<f64>,
    pub hour_of_week: usize,
}

impl PreliminaryRow {
    pub fn cdd_65(&self) -> Option<f64> {
        self.temperature_mean.map(|t| (t - 65.0).max(0.0))
    }

    pub fn hdd_50(&self) -> Option<f64> {
        self.temperature_mean.map(|t| (50.0 - t).max(0.0))
    }

    fn is_complete(&self) -> bool {
        self.meter_value.is_some() && self.temperature_mean.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreliminaryDesignMatrix {
    pub rows: Vec<PreliminaryRow>,
}

impl PreliminaryDesignMatrix {
    pub fn index(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }
}

pub fn create_caltrack_hourly_preliminary_design_matrix(
    meter_data: &TimeSeries,
    temperature_data: &TimeSeries,
) -> PreliminaryDesignMatrix {
    let temps = temperature_data.resample(Frequency::Hourly, Aggregation::Mean);
    let rows = meter_data
        .resample(Frequency::Hourly, Aggregation::Sum)
        .iter()
        .map(|p| PreliminaryRow {
            timestamp: p.timestamp,
            meter_value: p.value,
            temperature_mean: temps.get(p.timestamp),
            hour_of_week: hour_of_week(p.timestamp),
        })
        .collect();
    PreliminaryDesignMatrix { rows }
}

/// Occupied flag per hour of week, per segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyLookup {
    pub segments: BTreeMap<String, Vec<bool>>,
}

impl OccupancyLookup {
    /// Unknown segments and hours count as occupied.
    pub fn is_occupied(&self, segment: &str, how: usize) -> bool {
        self.segments
            .get(segment)
            .and_then(|hours| hours.get(how))
            .copied()
            .unwrap_or(true)
    }

    pub fn for_segment(&self, segment: &str) -> Vec<bool> {
        self.segments
            .get(segment)
            .cloned()
            .unwrap_or_else(|| vec![true; HOURS_PER_WEEK])
    }
}

/// Marks an hour of week occupied when more than `threshold` of its residuals
/// against a simple degree-day fit are positive.
pub fn estimate_hour_of_week_occupancy(
    design_matrix: &PreliminaryDesignMatrix,
    segmentation: &Segmentation,
    threshold: f64,
) -> OccupancyLookup {
    let mut lookup = OccupancyLookup::default();

    for (s, name) in segmentation.segment_names.iter().enumerate() {
        let rows: Vec<(&PreliminaryRow, f64)> = segmentation
            .rows(s)
            .map(|(i, w)| (&design_matrix.rows[i], w))
            .filter(|(r, _)| r.is_complete())
            .collect();

        let mut positive = [0usize; HOURS_PER_WEEK];
        let mut total = [0usize; HOURS_PER_WEEK];

        if !rows.is_empty() {
            let n = rows.len();
            let x = DMatrix::from_fn(n, 3, |i, j| match j {
                0 => 1.0,
                1 => rows[i].0.cdd_65().unwrap_or(0.0),
                _ => rows[i].0.hdd_50().unwrap_or(0.0),
            });
            let y = DVector::from_iterator(n, rows.iter().map(|(r, _)| r.meter_value.unwrap_or(0.0)));
            let weights: Vec<f64> = rows.iter().map(|(_, w)| *w).collect();

            match wls(&x, &y, &weights) {
                Ok(beta) => {
                    let fitted = &x * &beta;
                    for (i, (row, _)) in rows.iter().enumerate() {
                        total[row.hour_of_week] += 1;
                        if y[i] - fitted[i] > 0.0 {
                            positive[row.hour_of_week] += 1;
                        }
                    }
                }
                Err(e) => warn!(segment = %name, error = %e, "occupancy fit failed"),
            }
        }

        let hours = (0..HOURS_PER_WEEK)
            .map(|h| total[h] == 0 || positive[h] as f64 / total[h] as f64 > threshold)
            .collect();
        lookup.segments.insert(name.clone(), hours);
    }

    lookup
}

/// Temperature bin endpoints per segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBins {
    pub segments: BTreeMap<String, Vec<f64>>,
}

impl TemperatureBins {
    pub fn endpoints(&self, segment: &str) -> &[f64] {
        self.segments.get(segment).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fits occupied and unoccupied temperature bins for every segment.
pub fn fit_temperature_bins(
    design_matrix: &PreliminaryDesignMatrix,
    segmentation: &Segmentation,
    occupancy: &OccupancyLookup,
    default_bins: &[f64],
    min_temperature_count: usize,
) -> (TemperatureBins, TemperatureBins) {
    let mut occupied_bins = TemperatureBins::default();
    let mut unoccupied_bins = TemperatureBins::default();

    for (s, name) in segmentation.segment_names.iter().enumerate() {
        let (occupied, unoccupied): (Vec<_>, Vec<_>) = segmentation
            .rows(s)
            .map(|(i, _)| &design_matrix.rows[i])
            .filter(|r| r.is_complete())
            .partition(|r| occupancy.is_occupied(name, r.hour_of_week));

        let temps = |rows: &[&PreliminaryRow]| -> Vec<f64> {
            rows.iter().filter_map(|r| r.temperature_mean).collect()
        };
        occupied_bins.segments.insert(
            name.clone(),
            fit_bin_endpoints(&temps(&occupied), default_bins, min_temperature_count),
        );
        unoccupied_bins.segments.insert(
            name.clone(),
            fit_bin_endpoints(&temps(&unoccupied), default_bins, min_temperature_count),
        );
    }

    (occupied_bins, unoccupied_bins)
}

/// Count of temperatures per right-closed bin: `(-inf, e0], (e0, e1], ..., (ek, inf)`.
fn bin_counts(temps: &[f64], endpoints: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; endpoints.len() + 1];
    for t in temps {
        let bin = endpoints
            .iter()
            .position(|e| *t <= *e)
            .unwrap_or(endpoints.len());
        counts[bin] += 1;
    }
    counts
}

/// Removes endpoints of under-populated bins, merging each small bin into
/// its smaller neighbour, until every bin holds `min_count` temperatures.
pub fn fit_bin_endpoints(temps: &[f64], default_bins: &[f64], min_count: usize) -> Vec<f64> {
    let mut endpoints = default_bins.to_vec();

    loop {
        let counts = bin_counts(temps, &endpoints);
        if counts.len() == 1 {
            break;
        }

        let last = counts.len() - 1;
        let mut remove = BTreeSet::new();
        for (i, &count) in counts.iter().enumerate() {
            if count >= min_count {
                continue;
            }
            let edge = if i == 0 {
                0
            } else if i == last || counts[i - 1] <= counts[i + 1] {
                i - 1
            } else {
                i
            };
            remove.insert(edge);
        }
        if remove.is_empty() {
            break;
        }

        endpoints = endpoints
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !remove.contains(i))
            .map(|(_, e)| e)
            .collect();
    }

    endpoints
}

/// Piecewise linear temperature features; they sum back to `t`.
pub fn temperature_bin_features(t: f64, endpoints: &[f64]) -> Vec<f64> {
    let Some((&first, _)) = endpoints.split_first() else {
        return vec![t];
    };
    let k = endpoints.len();
    let mut features = Vec::with_capacity(k + 1);
    features.push(t.min(first));
    for i in 1..k {
        features.push((t - endpoints[i - 1]).clamp(0.0, endpoints[i] - endpoints[i - 1]));
    }
    features.push((t - endpoints[k - 1]).max(0.0));
    features
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub timestamp: DateTime<Utc>,
    pub weight: f64,
    pub meter_value: f64,
    /// Aligned with [`SegmentDesignMatrix::columns`].
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDesignMatrix {
    pub segment_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<SegmentRow>,
}

pub fn create_caltrack_hourly_segmented_design_matrices(
    design_matrix: &PreliminaryDesignMatrix,
    segmentation: &Segmentation,
    occupancy: &OccupancyLookup,
    occupied_bins: &TemperatureBins,
    unoccupied_bins: &TemperatureBins,
) -> Vec<SegmentDesignMatrix> {
    segmentation
        .segment_names
        .iter()
        .enumerate()
        .map(|(s, name)| {
            let rows: Vec<(&PreliminaryRow, f64)> = segmentation
                .rows(s)
                .map(|(i, w)| (&design_matrix.rows[i], w))
                .filter(|(r, _)| r.is_complete())
                .collect();

            let hours: BTreeSet<usize> = rows.iter().map(|(r, _)| r.hour_of_week).collect();
            let occ_endpoints = occupied_bins.endpoints(name);
            let unocc_endpoints = unoccupied_bins.endpoints(name);

            let mut columns: Vec<String> = hours.iter().map(|h| hour_column(*h)).collect();
            let hour_index: BTreeMap<usize, usize> =
                hours.iter().enumerate().map(|(i, h)| (*h, i)).collect();
            let occ_offset = columns.len();
            columns.extend((0..=occ_endpoints.len()).map(|b| bin_column(b, true)));
            let unocc_offset = columns.len();
            columns.extend((0..=unocc_endpoints.len()).map(|b| bin_column(b, false)));

            let mut segment_rows: Vec<SegmentRow> = rows
                .iter()
                .map(|(row, weight)| {
                    let mut features = vec![0.0; columns.len()];
                    features[hour_index[&row.hour_of_week]] = 1.0;
                    let t = row.temperature_mean.unwrap_or_default();
                    let (offset, endpoints) = if occupancy.is_occupied(name, row.hour_of_week) {
                        (occ_offset, occ_endpoints)
                    } else {
                        (unocc_offset, unocc_endpoints)
                    };
                    for (b, value) in temperature_bin_features(t, endpoints).into_iter().enumerate() {
                        features[offset + b] = value;
                    }
                    SegmentRow {
                        timestamp: row.timestamp,
                        weight: *weight,
                        meter_value: row.meter_value.unwrap_or_default(),
                        features,
                    }
                })
                .collect();

            // Columns never populated (e.g. no unoccupied hours) carry no information.
            let keep: Vec<bool> = (0..columns.len())
                .map(|c| segment_rows.iter().any(|r| r.features[c] != 0.0))
                .collect();
            let columns = columns
                .into_iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(c, _)| c)
                .collect();
            for row in &mut segment_rows {
                row.features = row
                    .features
                    .iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(f, _)| *f)
                    .collect();
            }

            SegmentDesignMatrix {
                segment_name: name.clone(),
                columns,
                rows: segment_rows,
            }
        })
        .collect()
}

/// Fitted coefficients of one segment with the lookups needed to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySegmentModel {
    pub segment_name: String,
    pub formula: String,
    pub model_params: BTreeMap<String, f64>,
    pub occupancy: Vec<bool>,
    pub occupied_bins: Vec<f64>,
    pub unoccupied_bins: Vec<f64>,
    #[serde(default)]
    pub warnings: Vec<ModelWarning>,
}

impl HourlySegmentModel {
    /// `None` when the hour of week was never observed in the segment.
    pub fn predict_hour(&self, ts: DateTime<Utc>, temperature: f64) -> Option<f64> {
        let how = hour_of_week(ts);
        let base = *self.model_params.get(&hour_column(how))?;
        let occupied = self.occupancy.get(how).copied().unwrap_or(true);
        let endpoints = if occupied {
            &self.occupied_bins
        } else {
            &self.unoccupied_bins
        };
        let temperature_part: f64 = temperature_bin_features(temperature, endpoints)
            .into_iter()
            .enumerate()
            .map(|(b, f)| {
                self.model_params
                    .get(&bin_column(b, occupied))
                    .copied()
                    .unwrap_or(0.0)
                    * f
            })
            .sum();
        Some(base + temperature_part)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedModel {
    pub segment_type: SegmentType,
    pub prediction_segment_type: SegmentType,
    /// Prediction segment name to fitted segment name, e.g. `jan` to `dec-jan-feb-weighted`.
    pub prediction_segment_name_mapping: BTreeMap<String, String>,
    pub segment_models: Vec<HourlySegmentModel>,
}

impl SegmentedModel {
    fn model_for(&self, ts: DateTime<Utc>) -> Option<&HourlySegmentModel> {
        let name = segment_name(self.prediction_segment_type, ts.month());
        let fitted = self.prediction_segment_name_mapping.get(&name)?;
        self.segment_models.iter().find(|m| &m.segment_name == fitted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyFitSettings {
    pub occupancy_threshold: f64,
    pub default_bins: Vec<f64>,
    pub min_temperature_count: usize,
}

impl Default for HourlyFitSettings {
    fn default() -> Self {
        Self {
            occupancy_threshold: OCCUPANCY_THRESHOLD,
            default_bins: DEFAULT_TEMPERATURE_BINS.to_vec(),
            min_temperature_count: MIN_TEMPERATURE_COUNT,
        }
    }
}

/// Result of [`fit_caltrack_hourly_model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyModelResults {
    pub status: ModelStatus,
    pub method_name: String,
    pub interval: String,
    pub model: Option<SegmentedModel>,
    pub warnings: Vec<ModelWarning>,
    pub metadata: serde_json::Value,
    pub settings: HourlyFitSettings,
    pub totals_metrics: Option<ModelMetrics>,
}

impl HourlyModelResults {
    pub fn predict(&self, index: &[DateTime<Utc>], temperature: &TimeSeries) -> Vec<ModelPrediction> {
        let temps = temperature.resample(Frequency::Hourly, Aggregation::Mean);
        index
            .iter()
            .map(|ts| {
                let hour = Frequency::Hourly.floor(*ts);
                let predicted_usage = self.model.as_ref().and_then(|m| {
                    let t = temps.get(hour)?;
                    m.model_for(hour)?.predict_hour(hour, t)
                });
                ModelPrediction {
                    timestamp: *ts,
                    predicted_usage,
                    base_load: None,
                    heating_load: None,
                    cooling_load: None,
                }
            })
            .collect()
    }
}

pub fn fit_caltrack_hourly_model(
    segmented_design_matrices: &[SegmentDesignMatrix],
    occupancy: &OccupancyLookup,
    occupied_bins: &TemperatureBins,
    unoccupied_bins: &TemperatureBins,
    settings: &HourlyFitSettings,
) -> HourlyModelResults {
    let mut results = HourlyModelResults {
        status: ModelStatus::NoData,
        method_name: "caltrack_hourly".to_string(),
        interval: Frequency::Hourly.to_string(),
        model: None,
        warnings: Vec::new(),
        metadata: json!({}),
        settings: settings.clone(),
        totals_metrics: None,
    };

    if segmented_design_matrices.iter().all(|m| m.rows.is_empty()) {
        warn!("no data in any hourly segment");
        results.warnings.push(ModelWarning::new(
            "eemeter.caltrack_hourly.no_data",
            "No data available. Cannot fit model.",
            json!({}),
        ));
        return results;
    }

    let mut observed = Vec::new();
    let mut fitted = Vec::new();
    let mut param_counts = Vec::new();
    let mut segment_models = Vec::with_capacity(segmented_design_matrices.len());

    for matrix in segmented_design_matrices {
        let name = &matrix.segment_name;
        let mut model = HourlySegmentModel {
            segment_name: name.clone(),
            formula: hourly_formula(&matrix.columns),
            model_params: BTreeMap::new(),
            occupancy: occupancy.for_segment(name),
            occupied_bins: occupied_bins.endpoints(name).to_vec(),
            unoccupied_bins: unoccupied_bins.endpoints(name).to_vec(),
            warnings: Vec::new(),
        };

        if matrix.rows.is_empty() {
            model.warnings.push(ModelWarning::new(
                "eemeter.caltrack_hourly.segment_no_data",
                "No data in segment. Cannot fit segment model.",
                json!({ "segment_name": name }),
            ));
            segment_models.push(model);
            continue;
        }

        let n = matrix.rows.len();
        let k = matrix.columns.len();
        let x = DMatrix::from_fn(n, k, |i, j| matrix.rows[i].features[j]);
        let y = DVector::from_iterator(n, matrix.rows.iter().map(|r| r.meter_value));
        let weights: Vec<f64> = matrix.rows.iter().map(|r| r.weight).collect();

        match wls(&x, &y, &weights) {
            Ok(beta) => {
                model.model_params = matrix
                    .columns
                    .iter()
                    .cloned()
                    .zip(beta.iter().copied())
                    .collect();
                param_counts.push(k);
                let predictions = &x * &beta;
                for (i, row) in matrix.rows.iter().enumerate() {
                    if row.weight >= 1.0 {
                        observed.push(Some(row.meter_value));
                        fitted.push(Some(predictions[i]));
                    }
                }
                debug!(segment = %name, rows = n, params = k, "fit hourly segment");
            }
            Err(e) => {
                warn!(segment = %name, error = %e, "hourly segment fit failed");
                model.warnings.push(ModelWarning::new(
                    "eemeter.caltrack_hourly.segment_fit_failed",
                    format!("Segment model could not be fit: {}", e),
                    json!({ "segment_name": name }),
                ));
            }
        }
        segment_models.push(model);
    }

    let num_parameters = if param_counts.is_empty() {
        0
    } else {
        (param_counts.iter().sum::<usize>() as f64 / param_counts.len() as f64).round() as usize
    };

    let prediction_segment_name_mapping = (1..=12)
        .map(|m| {
            (
                segment_name(SegmentType::OneMonth, m),
                segment_name(SegmentType::ThreeMonthWeighted, m),
            )
        })
        .collect();

    info!(
        segments = segment_models.len(),
        fitted = param_counts.len(),
        "fit hourly model"
    );

    results.status = ModelStatus::Success;
    results.metadata = json!({
        "n_segments": segment_models.len(),
        "n_segments_fitted": param_counts.len(),
    });
    results.totals_metrics = ModelMetrics::compute(&observed, &fitted, num_parameters);
    results.model = Some(SegmentedModel {
        segment_type: SegmentType::ThreeMonthWeighted,
        prediction_segment_type: SegmentType::OneMonth,
        prediction_segment_name_mapping,
        segment_models,
    });
    results
}

fn hourly_formula(columns: &[String]) -> String {
    let bins: String = columns
        .iter()
        .filter(|c| c.starts_with("bin_"))
        .map(|c| format!(" + {}", c))
        .collect();
    format!("meter_value ~ C(hour_of_week) - 1{}", bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caltrack::segmentation::segment_time_series;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        // A Monday.
        Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
    }

    fn occupied_hour(ts: DateTime<Utc>) -> bool {
        ts.weekday().num_days_from_monday() < 5 && (8..18).contains(&ts.hour())
    }

    fn temperature_at(i: i64) -> f64 {
        let day = (i / 24) as f64;
        let hour = (i % 24) as f64;
        40.0 + 15.0 * (day / 9.0).sin() + 8.0 * ((hour - 9.0) / 24.0 * std::f64::consts::TAU).sin()
    }

    fn synthetic(hours: i64) -> (TimeSeries, TimeSeries) {
        let meter = TimeSeries::from_points((0..hours).map(|i| {
            let ts = start() + Duration::hours(i);
            let t = temperature_at(i);
            let load = if occupied_hour(ts) { 5.0 } else { 1.0 };
            (ts, Some(load + 0.1 * (55.0 - t).max(0.0)))
        }));
        let temps = TimeSeries::from_points(
            (0..hours).map(|i| (start() + Duration::hours(i), Some(temperature_at(i)))),
        );
        (meter, temps)
    }

    #[test]
    fn test_hour_of_week() {
        assert_eq!(hour_of_week(start()), 0);
        assert_eq!(hour_of_week(start() + Duration::hours(30)), 30);
        assert_eq!(hour_of_week(start() + Duration::hours(167)), 167);
        assert_eq!(hour_of_week(start() + Duration::hours(168)), 0);
    }

    #[test]
    fn test_occupancy_detects_schedule() {
        let (meter, temps) = synthetic(24 * 28);
        let dm = create_caltrack_hourly_preliminary_design_matrix(&meter, &temps);
        let seg = segment_time_series(&dm.index(), SegmentType::ThreeMonthWeighted);
        let occupancy = estimate_hour_of_week_occupancy(&dm, &seg, OCCUPANCY_THRESHOLD);

        let january = "dec-jan-feb-weighted";
        assert!(occupancy.is_occupied(january, 10));
        assert!(!occupancy.is_occupied(january, 2));
        assert!(!occupancy.is_occupied(january, 6 * 24 + 12));
        // Segments without data default to occupied.
        assert!(occupancy.is_occupied("jun-jul-aug-weighted", 2));
    }

    #[test]
    fn test_fit_bin_endpoints_keeps_populated_bins() {
        let temps: Vec<f64> = (0..1000).map(|i| i as f64 / 10.0).collect();
        assert_eq!(
            fit_bin_endpoints(&temps, &DEFAULT_TEMPERATURE_BINS, MIN_TEMPERATURE_COUNT),
            DEFAULT_TEMPERATURE_BINS.to_vec()
        );
    }

    #[test]
    fn test_fit_bin_endpoints_merges_sparse_bins() {
        let constant = vec![50.0; 100];
        assert!(fit_bin_endpoints(&constant, &DEFAULT_TEMPERATURE_BINS, 20).is_empty());

        // Nothing above 60 °F: the upper bins collapse.
        let cool: Vec<f64> = (0..400).map(|i| 20.0 + i as f64 / 10.0).collect();
        let endpoints = fit_bin_endpoints(&cool, &DEFAULT_TEMPERATURE_BINS, 20);
        assert_eq!(endpoints, vec![30.0, 45.0, 55.0]);
    }

    #[test]
    fn test_temperature_bin_features_sum_to_temperature() {
        assert_eq!(temperature_bin_features(50.0, &[30.0, 45.0]), vec![30.0, 15.0, 5.0]);
        assert_eq!(temperature_bin_features(20.0, &[30.0, 45.0]), vec![20.0, 0.0, 0.0]);
        assert_eq!(temperature_bin_features(12.5, &[]), vec![12.5]);
    }

    #[test]
    fn test_segmented_design_matrix_drops_empty_columns() {
        let (meter, temps) = synthetic(24 * 14);
        let dm = create_caltrack_hourly_preliminary_design_matrix(&meter, &temps);
        let seg = segment_time_series(&dm.index(), SegmentType::ThreeMonthWeighted);
        let occupancy = estimate_hour_of_week_occupancy(&dm, &seg, OCCUPANCY_THRESHOLD);
        let (occ, unocc) =
            fit_temperature_bins(&dm, &seg, &occupancy, &DEFAULT_TEMPERATURE_BINS, MIN_TEMPERATURE_COUNT);
        let matrices =
            create_caltrack_hourly_segmented_design_matrices(&dm, &seg, &occupancy, &occ, &unocc);

        assert_eq!(matrices.len(), 12);
        let january = matrices
            .iter()
            .find(|m| m.segment_name == "dec-jan-feb-weighted")
            .unwrap();
        assert_eq!(january.rows.len(), 24 * 14);
        assert!(january.columns.iter().filter(|c| c.starts_with("hour_of_week")).count() == 168);
        for column in 0..january.columns.len() {
            assert!(january.rows.iter().any(|r| r.features[column] != 0.0));
        }
        let july = matrices
            .iter()
            .find(|m| m.segment_name == "jun-jul-aug-weighted")
            .unwrap();
        assert!(july.rows.is_empty());
    }

    #[test]
    fn test_fit_and_predict_hourly_model() {
        let (meter, temps) = synthetic(24 * 42);
        let dm = create_caltrack_hourly_preliminary_design_matrix(&meter, &temps);
        let seg = segment_time_series(&dm.index(), SegmentType::ThreeMonthWeighted);
        let occupancy = estimate_hour_of_week_occupancy(&dm, &seg, OCCUPANCY_THRESHOLD);
        let (occ, unocc) =
            fit_temperature_bins(&dm, &seg, &occupancy, &DEFAULT_TEMPERATURE_BINS, MIN_TEMPERATURE_COUNT);
        let matrices =
            create_caltrack_hourly_segmented_design_matrices(&dm, &seg, &occupancy, &occ, &unocc);
        let results =
            fit_caltrack_hourly_model(&matrices, &occupancy, &occ, &unocc, &HourlyFitSettings::default());

        assert_eq!(results.status, ModelStatus::Success);
        let metrics = results.totals_metrics.as_ref().unwrap();
        assert!(metrics.r_squared.unwrap() > 0.95);

        let index: Vec<_> = (0..48).map(|i| start() + Duration::hours(24 * 7 + i)).collect();
        let predictions = results.predict(&index, &temps);
        for p in &predictions {
            let observed = meter.get(p.timestamp).unwrap();
            assert!((p.predicted_usage.unwrap() - observed).abs() < 0.5);
        }

        // No temperatures for July: nothing can be predicted.
        let july = Utc.with_ymd_and_hms(2018, 7, 2, 10, 0, 0).unwrap();
        assert_eq!(results.predict(&[july], &temps)[0].predicted_usage, None);
    }

    #[test]
    fn test_fit_without_rows_is_no_data() {
        let results = fit_caltrack_hourly_model(
            &[],
            &OccupancyLookup::default(),
            &TemperatureBins::default(),
            &TemperatureBins::default(),
            &HourlyFitSettings::default(),
        );
        assert_eq!(results.status, ModelStatus::NoData);
        assert!(results.model.is_none());
    }
}
