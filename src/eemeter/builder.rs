//! Fits CalTRACK baseline models from [`MeterData`].

use tracing::info;

use super::reader::MeterData;
use crate::caltrack::hourly::HourlyFitSettings;
use crate::caltrack::{
    create_caltrack_daily_design_matrix, create_caltrack_hourly_preliminary_design_matrix,
    create_caltrack_hourly_segmented_design_matrices, estimate_hour_of_week_occupancy,
    fit_caltrack_hourly_model, fit_caltrack_usage_per_day_model, fit_temperature_bins,
    segment_time_series, BaselineModel, DailyFitSettings, Frequency, SegmentType,
};
use crate::error::{Error, Result};

/// Fits the model for `freq`, which must be `hourly` or `daily`.
pub fn get_model_for_freq(
    data: &MeterData,
    freq: &str,
    settings: &DailyFitSettings,
) -> Result<BaselineModel> {
    match freq.parse::<Frequency>() {
        Ok(Frequency::Hourly) => Ok(get_hourly_model(data)),
        Ok(Frequency::Daily) => Ok(get_daily_model(data, settings)),
        Err(_) => Err(Error::UnsupportedFrequency(freq.to_string())),
    }
}

pub fn get_daily_model(data: &MeterData, settings: &DailyFitSettings) -> BaselineModel {
    info!("creating daily baseline design matrix");
    let design_matrix =
        create_caltrack_daily_design_matrix(&data.baseline_meter_data, &data.temperature_data);

    info!(days = design_matrix.rows.len(), "fitting CalTRACK usage per day model");
    let model = fit_caltrack_usage_per_day_model(&design_matrix, settings);
    info!(status = ?model.status, "daily model done");
    BaselineModel::UsagePerDay(model)
}

pub fn get_hourly_model(data: &MeterData) -> BaselineModel {
    let settings = HourlyFitSettings::default();

    info!("creating hourly preliminary design matrix");
    let preliminary = create_caltrack_hourly_preliminary_design_matrix(
        &data.baseline_meter_data,
        &data.temperature_data,
    );

    info!(hours = preliminary.rows.len(), "segmenting time series");
    let segmentation = segment_time_series(&preliminary.index(), SegmentType::ThreeMonthWeighted);

    info!("estimating hour of week occupancy");
    let occupancy =
        estimate_hour_of_week_occupancy(&preliminary, &segmentation, settings.occupancy_threshold);

    info!("fitting temperature bins");
    let (occupied_bins, unoccupied_bins) = fit_temperature_bins(
        &preliminary,
        &segmentation,
        &occupancy,
        &settings.default_bins,
        settings.min_temperature_count,
    );

    info!("creating segmented design matrices");
    let matrices = create_caltrack_hourly_segmented_design_matrices(
        &preliminary,
        &segmentation,
        &occupancy,
        &occupied_bins,
        &unoccupied_bins,
    );

    info!(segments = matrices.len(), "fitting CalTRACK hourly model");
    let model = fit_caltrack_hourly_model(
        &matrices,
        &occupancy,
        &occupied_bins,
        &unoccupied_bins,
        &settings,
    );
    info!(status = ?model.status, "hourly model done");
    BaselineModel::Hourly(model)
}
