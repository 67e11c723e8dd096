//! Reads meter and weather history into analysis-ready time series.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::caltrack::sample::{load_sample, Sample, DAILY_SAMPLE, HOURLY_SAMPLE};
use crate::caltrack::series::{meter_data_from_readings, temperature_data_from_readings};
use crate::caltrack::{get_baseline_data, Frequency, ModelWarning, SampleMetadata, TimeSeries};
use crate::domain::{Meter, DEFAULT_UOM_ID};
use crate::error::{Error, Result};
use crate::repo::Store;

/// Days of data at most used for a baseline or reporting period.
pub const MAX_PERIOD_DAYS: i64 = 365;

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub blackout_start_date: Option<DateTime<Utc>>,
    pub blackout_end_date: Option<DateTime<Utc>>,
    /// `hourly` or `daily`; anything else reads the series as stored.
    pub freq: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Meter and temperature series with the derived baseline period.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterData {
    pub meter_uom_id: Option<String>,
    pub meter_data: TimeSeries,
    pub temperature_data: TimeSeries,
    pub sample_metadata: Option<SampleMetadata>,
    pub blackout_start_date: Option<DateTime<Utc>>,
    pub blackout_end_date: Option<DateTime<Utc>>,
    pub baseline_meter_data: TimeSeries,
    pub baseline_warnings: Vec<ModelWarning>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Station whose readings serve as the meter's temperatures: the meter's own,
/// else the first station linked to its site.
pub async fn meter_weather_station(store: &dyn Store, meter: &Meter) -> Result<Option<String>> {
    if let Some(id) = &meter.weather_station_id {
        return Ok(Some(id.clone()));
    }
    Ok(store
        .site_weather_stations(&meter.site_id)
        .await?
        .into_iter()
        .next()
        .map(|link| link.weather_station_id))
}

pub async fn read_meter_data(
    store: &dyn Store,
    meter: &Meter,
    options: &ReadOptions,
) -> Result<MeterData> {
    info!(meter_id = %meter.meter_id, freq = ?options.freq, "reading meter data");

    let readings = store
        .meter_history(&meter.meter_id, options.start, options.end)
        .await?;
    let meter_uom_id = readings.first().and_then(|r| r.uom_id.clone());
    let freq = Frequency::parse_lenient(options.freq.as_deref());
    let meter_data = meter_data_from_readings(
        readings.iter().map(|r| (r.as_of_datetime, r.value)),
        freq,
    );

    let (Some(start), Some(end)) = (meter_data.first_timestamp(), meter_data.last_timestamp()) else {
        return Err(Error::NoMeterData {
            meter_id: meter.meter_id.clone(),
        });
    };
    debug!(points = meter_data.len(), %start, %end, "meter data");

    // Temperatures cover the whole last interval.
    let temperature_end = end + freq.map_or(Duration::zero(), |f| f.delta() - Duration::seconds(1));
    let temperature_data = match meter_weather_station(store, meter).await? {
        Some(station) => {
            let rows = store
                .weather_history(&station, Some(start), Some(temperature_end))
                .await?;
            temperature_data_from_readings(
                rows.iter()
                    .filter_map(|r| r.temp_f.map(|t| (r.as_of_datetime, t))),
            )
        }
        None => {
            warn!(meter_id = %meter.meter_id, "meter has no weather station");
            TimeSeries::new()
        }
    };
    debug!(points = temperature_data.len(), "temperature data");

    let baseline_end = options.blackout_start_date.unwrap_or(end);
    let (baseline_meter_data, baseline_warnings) =
        get_baseline_data(&meter_data, None, Some(baseline_end), Some(MAX_PERIOD_DAYS))?;
    let (Some(start), Some(end)) = (
        baseline_meter_data.first_timestamp(),
        baseline_meter_data.last_timestamp(),
    ) else {
        return Err(Error::NoBaselineData);
    };
    info!(%start, %end, "baseline meter data");

    Ok(MeterData {
        meter_uom_id,
        meter_data,
        temperature_data,
        sample_metadata: None,
        blackout_start_date: options.blackout_start_date,
        blackout_end_date: options.blackout_end_date,
        baseline_meter_data,
        baseline_warnings,
        start,
        end,
    })
}

/// Builds [`MeterData`] from a bundled sample, split at its blackout dates.
pub fn read_sample_data(sample: Sample) -> Result<MeterData> {
    let Sample {
        meter_data,
        temperature_data,
        metadata,
    } = sample;
    let blackout_start_date = metadata.blackout_start_date;
    let blackout_end_date = metadata.blackout_end_date;

    let (baseline_meter_data, baseline_warnings) = get_baseline_data(
        &meter_data,
        None,
        Some(blackout_start_date),
        Some(MAX_PERIOD_DAYS),
    )?;
    let (Some(start), Some(end)) = (meter_data.first_timestamp(), meter_data.last_timestamp()) else {
        return Err(Error::NoBaselineData);
    };

    Ok(MeterData {
        meter_uom_id: Some(DEFAULT_UOM_ID.to_string()),
        meter_data,
        temperature_data,
        sample_metadata: Some(metadata),
        blackout_start_date: Some(blackout_start_date),
        blackout_end_date: Some(blackout_end_date),
        baseline_meter_data,
        baseline_warnings,
        start,
        end,
    })
}

pub fn get_daily_sample_data() -> Result<MeterData> {
    read_sample_data(load_sample(DAILY_SAMPLE)?)
}

pub fn get_hourly_sample_data() -> Result<MeterData> {
    read_sample_data(load_sample(HOURLY_SAMPLE)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_sample_baseline_ends_at_blackout() {
        let data = get_daily_sample_data().unwrap();
        let blackout = data.blackout_start_date.unwrap();

        assert_eq!(data.meter_uom_id.as_deref(), Some("energy_kWh"));
        assert_eq!(data.baseline_meter_data.last_timestamp(), Some(blackout));
        assert_eq!(
            data.baseline_meter_data.first_timestamp(),
            Some(blackout - Duration::days(MAX_PERIOD_DAYS))
        );
        assert_eq!(data.start, data.meter_data.first_timestamp().unwrap());
        assert_eq!(data.end, data.meter_data.last_timestamp().unwrap());
    }
}
