//! Ordered time series and baseline/reporting period extraction.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use super::ModelWarning;
use crate::error::{Error, Result};

/// Sampling frequency of a meter series and of a baseline model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
}

impl Frequency {
    /// Length of one interval.
    pub fn delta(self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::days(1),
        }
    }

    /// Start of the interval containing `ts`.
    pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.delta().num_seconds();
        let secs = ts.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(step), 0).unwrap_or(ts)
    }

    /// Parses `hourly`/`daily`; anything else means "no resampling".
    pub fn parse_lenient(freq: Option<&str>) -> Option<Self> {
        freq.and_then(|f| f.parse().ok())
    }
}

/// How values falling into the same bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Time-ordered series with unique timestamps; `None` marks a missing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from unordered points. For duplicate timestamps the last value wins.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, Option<f64>)>,
    {
        let merged: BTreeMap<DateTime<Utc>, Option<f64>> = points
            .into_iter()
            .map(|(ts, v)| (ts, v.filter(|x| !x.is_nan())))
            .collect();
        Self {
            points: merged
                .into_iter()
                .map(|(timestamp, value)| SeriesPoint { timestamp, value })
                .collect(),
        }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Value at exactly `ts`, if present and not missing.
    pub fn get(&self, ts: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by(|p| p.timestamp.cmp(&ts))
            .ok()
            .and_then(|i| self.points[i].value)
    }

    /// Number of non-missing values.
    pub fn count_valid(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }

    /// Sum of the non-missing values.
    pub fn sum(&self) -> f64 {
        self.points.iter().filter_map(|p| p.value).sum()
    }

    pub fn mean(&self) -> Option<f64> {
        let n = self.count_valid();
        (n > 0).then(|| self.sum() / n as f64)
    }

    /// Points with `start <= ts <= end`; open bounds are unbounded.
    pub fn between(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| start.map_or(true, |s| p.timestamp >= s))
                .filter(|p| end.map_or(true, |e| p.timestamp <= e))
                .copied()
                .collect(),
        }
    }

    /// Regular series with one bucket per interval from the first to the last
    /// observation. Buckets with no value are kept as missing.
    pub fn resample(&self, freq: Frequency, aggregation: Aggregation) -> Self {
        let (Some(first), Some(last)) = (self.first_timestamp(), self.last_timestamp()) else {
            return Self::new();
        };

        let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
        let mut ts = freq.floor(first);
        let end = freq.floor(last);
        while ts <= end {
            buckets.insert(ts, (0.0, 0));
            ts += freq.delta();
        }

        for point in &self.points {
            if let Some(value) = point.value {
                let bucket = buckets.entry(freq.floor(point.timestamp)).or_insert((0.0, 0));
                bucket.0 += value;
                bucket.1 += 1;
            }
        }

        Self {
            points: buckets
                .into_iter()
                .map(|(timestamp, (sum, count))| SeriesPoint {
                    timestamp,
                    value: match (count, aggregation) {
                        (0, _) => None,
                        (_, Aggregation::Sum) => Some(sum),
                        (n, Aggregation::Mean) => Some(sum / n as f64),
                    },
                })
                .collect(),
        }
    }
}

/// Meter usage series from raw readings, summed per interval when a frequency is given.
pub fn meter_data_from_readings(
    readings: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
    freq: Option<Frequency>,
) -> TimeSeries {
    let raw = TimeSeries::from_points(readings.into_iter().map(|(ts, v)| (ts, Some(v))));
    match freq {
        Some(freq) => raw.resample(freq, Aggregation::Sum),
        None => raw,
    }
}

/// Hourly mean temperature series from raw readings.
pub fn temperature_data_from_readings(
    readings: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
) -> TimeSeries {
    TimeSeries::from_points(readings.into_iter().map(|(ts, v)| (ts, Some(v))))
        .resample(Frequency::Hourly, Aggregation::Mean)
}

/// Baseline period: at most `max_days` ending at `end` (defaults to the last
/// observation), never earlier than `start`.
pub fn get_baseline_data(
    data: &TimeSeries,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    max_days: Option<i64>,
) -> Result<(TimeSeries, Vec<ModelWarning>)> {
    let (Some(data_start), Some(data_end)) = (data.first_timestamp(), data.last_timestamp()) else {
        return Err(Error::NoBaselineData);
    };

    let end_target = end.unwrap_or(data_end);
    let start_target = match (start, max_days) {
        (Some(s), Some(days)) => Some(s.max(end_target - Duration::days(days))),
        (None, Some(days)) => Some(end_target - Duration::days(days)),
        (s, None) => s,
    };

    let baseline = data.between(start_target, Some(end_target));
    if baseline.count_valid() == 0 {
        return Err(Error::NoBaselineData);
    }

    let mut warnings = Vec::new();
    if let Some(requested) = start_target {
        if data_start > requested {
            warnings.push(ModelWarning::new(
                "eemeter.get_baseline_data.gap_at_baseline_start",
                "Data does not have coverage at requested baseline start date.",
                json!({ "requested_start": requested, "data_start": data_start }),
            ));
        }
    }
    if data_end < end_target {
        warnings.push(ModelWarning::new(
            "eemeter.get_baseline_data.gap_at_baseline_end",
            "Data does not have coverage at requested baseline end date.",
            json!({ "requested_end": end_target, "data_end": data_end }),
        ));
    }
    for w in &warnings {
        warn!(warning = %w.qualified_name, "baseline data warning");
    }
    debug!(points = baseline.len(), "extracted baseline data");

    Ok((baseline, warnings))
}

/// Reporting period: at most `max_days` starting at `start` (defaults to the
/// first observation), never later than `end`.
pub fn get_reporting_data(
    data: &TimeSeries,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    max_days: Option<i64>,
) -> Result<(TimeSeries, Vec<ModelWarning>)> {
    let (Some(data_start), Some(data_end)) = (data.first_timestamp(), data.last_timestamp()) else {
        return Err(Error::NoReportingData);
    };

    let start_target = start.unwrap_or(data_start);
    let end_target = match (end, max_days) {
        (Some(e), Some(days)) => Some(e.min(start_target + Duration::days(days))),
        (None, Some(days)) => Some(start_target + Duration::days(days)),
        (e, None) => e,
    };

    let reporting = data.between(Some(start_target), end_target);
    if reporting.count_valid() == 0 {
        return Err(Error::NoReportingData);
    }

    let mut warnings = Vec::new();
    if data_start > start_target {
        warnings.push(ModelWarning::new(
            "eemeter.get_reporting_data.gap_at_reporting_start",
            "Data does not have coverage at requested reporting start date.",
            json!({ "requested_start": start_target, "data_start": data_start }),
        ));
    }
    if let Some(requested) = end_target {
        if data_end < requested {
            warnings.push(ModelWarning::new(
                "eemeter.get_reporting_data.gap_at_reporting_end",
                "Data does not have coverage at requested reporting end date.",
                json!({ "requested_end": requested, "data_end": data_end }),
            ));
        }
    }
    debug!(points = reporting.len(), "extracted reporting data");

    Ok((reporting, warnings))
}
