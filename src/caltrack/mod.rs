//! CalTRACK analytics
//!
//! Baseline data extraction, design matrices, daily (usage per day) and hourly
//! (time-of-week and temperature) model fitting, and metered savings with
//! ASHRAE Guideline 14 error bands. Temperatures are in degrees Fahrenheit.
//!
//! The orchestration in [`crate::eemeter`] only sequences calls into this
//! module; nothing here touches the store.

pub mod daily;
pub mod hourly;
pub mod metrics;
pub mod model;
pub mod ols;
pub mod plot;
pub mod sample;
pub mod savings;
pub mod segmentation;
pub mod series;

use serde::{Deserialize, Serialize};

pub use daily::{
    create_caltrack_daily_design_matrix, fit_caltrack_usage_per_day_model, DailyDesignMatrix,
    DailyFitSettings, UsagePerDayCandidate, UsagePerDayModelResults,
};
pub use hourly::{
    create_caltrack_hourly_preliminary_design_matrix,
    create_caltrack_hourly_segmented_design_matrices, estimate_hour_of_week_occupancy,
    fit_caltrack_hourly_model, fit_temperature_bins, HourlyModelResults, OccupancyLookup,
    TemperatureBins,
};
pub use metrics::ModelMetrics;
pub use model::{BaselineModel, ModelClass, ModelPrediction, ModelStatus};
pub use sample::{load_sample, Sample, SampleMetadata};
pub use savings::{metered_savings, ErrorBands, MeteredSavings, SavingsRow};
pub use segmentation::{segment_time_series, SegmentType, Segmentation};
pub use series::{
    get_baseline_data, get_reporting_data, Aggregation, Frequency, SeriesPoint, TimeSeries,
};

/// Diagnostic attached to data extraction and model fitting results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWarning {
    pub qualified_name: String,
    pub description: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ModelWarning {
    pub fn new(
        qualified_name: impl Into<String>,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            description: description.into(),
            data,
        }
    }
}

/// Returns the value when it is a finite number.
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
