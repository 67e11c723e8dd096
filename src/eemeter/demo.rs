//! Seeds a site with a sample weather station, meter and baseline models.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::builder::get_model_for_freq;
use super::persistence::{save_model, SaveModelRequest};
use super::progress::LogProgress;
use super::reader::{read_meter_data, ReadOptions};
use super::savings::calc_meter_savings;
use crate::caltrack::sample::{load_sample, HOURLY_SAMPLE};
use crate::caltrack::{DailyFitSettings, Frequency, TimeSeries};
use crate::domain::{
    BaselineModelRecord, Meter, MeterHistory, Site, SiteWeatherStation, WeatherHistory,
    WeatherStation, DEFAULT_UOM_ID,
};
use crate::error::{Error, Result};
use crate::repo::Store;

pub const SAMPLE_WEATHER_STATION_ID: &str = "eemeter_ws";
const SAMPLE_SOURCE: &str = "eemeter_sample";

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Site object id or entity id.
    pub site_id: String,
    /// Defaults to `<site_id>-sample_meter`.
    pub meter_id: Option<String>,
    /// Defaults to `Sample Meter`.
    pub description: Option<String>,
    pub calc_savings: bool,
    pub confidence_level: f64,
}

/// Timestamps of `series` moved so the last one lands on yesterday 23:00 UTC,
/// one hour apart going backwards.
fn shifted_to_yesterday(series: &TimeSeries) -> Vec<(DateTime<Utc>, f64)> {
    let last = Frequency::Daily.floor(Utc::now()) - Duration::hours(1);
    let n = series.len() as i64;
    series
        .iter()
        .enumerate()
        .filter_map(|(i, p)| Some((last - Duration::hours(n - 1 - i as i64), p.value?)))
        .collect()
}

pub async fn setup_demo_sample_models(
    store: &dyn Store,
    options: &DemoOptions,
) -> Result<(Site, Meter, BaselineModelRecord)> {
    let sample = load_sample(HOURLY_SAMPLE)?;

    let site = store
        .find_site(&options.site_id)
        .await?
        .ok_or_else(|| Error::not_found("Site", &options.site_id))?;

    if store
        .get_weather_station(SAMPLE_WEATHER_STATION_ID)
        .await?
        .is_none()
    {
        info!(station = SAMPLE_WEATHER_STATION_ID, "creating sample weather station");
        store
            .insert_weather_station(&WeatherStation {
                weather_station_id: SAMPLE_WEATHER_STATION_ID.to_string(),
                station_name: Some("Sample Station".to_string()),
                source: Some(SAMPLE_SOURCE.to_string()),
                elevation_uom_id: Some("length_m".to_string()),
            })
            .await?;
        store
            .link_site_weather_station(&SiteWeatherStation {
                site_id: site.entity_id.clone(),
                weather_station_id: SAMPLE_WEATHER_STATION_ID.to_string(),
                source: Some(SAMPLE_SOURCE.to_string()),
            })
            .await?;
    }

    let removed = store
        .delete_weather_history(SAMPLE_WEATHER_STATION_ID)
        .await?;
    let temperatures: Vec<WeatherHistory> = shifted_to_yesterday(&sample.temperature_data)
        .into_iter()
        .map(|(ts, temp_f)| {
            WeatherHistory::from_fahrenheit(
                SAMPLE_WEATHER_STATION_ID,
                ts,
                temp_f,
                Some(SAMPLE_SOURCE.to_string()),
            )
        })
        .collect();
    info!(removed, rows = temperatures.len(), "adding sample weather data");
    store.insert_weather_history(&temperatures).await?;

    let meter_id = options
        .meter_id
        .clone()
        .unwrap_or_else(|| format!("{}-sample_meter", options.site_id));
    let description = options
        .description
        .clone()
        .unwrap_or_else(|| "Sample Meter".to_string());

    store.delete_meter(&meter_id).await?;
    info!(%meter_id, "creating sample meter");
    let meter = Meter {
        meter_id: meter_id.clone(),
        site_id: site.entity_id.clone(),
        description: Some(description),
        account_number: Some("123456789".to_string()),
        utility_id: Some("USA_EIA_11208".to_string()),
        weather_station_id: Some(SAMPLE_WEATHER_STATION_ID.to_string()),
    };
    store.insert_meter(&meter).await?;

    let readings: Vec<MeterHistory> = shifted_to_yesterday(&sample.meter_data)
        .into_iter()
        .map(|(ts, value)| MeterHistory {
            meter_id: meter_id.clone(),
            as_of_datetime: ts,
            value,
            uom_id: Some(DEFAULT_UOM_ID.to_string()),
            source: Some(SAMPLE_SOURCE.to_string()),
        })
        .collect();
    info!(%meter_id, rows = readings.len(), "adding sample meter data");
    store.insert_meter_history(&readings).await?;

    let timestamps = temperatures
        .iter()
        .map(|t| t.as_of_datetime)
        .chain(readings.iter().map(|r| r.as_of_datetime));
    let (Some(min_datetime), Some(max_datetime)) =
        (timestamps.clone().min(), timestamps.max())
    else {
        return Err(Error::NoMeterData { meter_id });
    };
    let baseline_end = (min_datetime + Duration::days(365)).min(max_datetime);

    let mut last_model = None;
    for (frequency, description) in [
        (Frequency::Hourly, "CalTrack Hourly Model"),
        (Frequency::Daily, "CalTrack Daily Model"),
    ] {
        let freq = frequency.to_string();
        let data = read_meter_data(
            store,
            &meter,
            &ReadOptions {
                freq: Some(freq.clone()),
                end: Some(baseline_end),
                ..Default::default()
            },
        )
        .await?;
        let model = get_model_for_freq(&data, &freq, &DailyFitSettings::default())?;
        let record = save_model(
            store,
            &model,
            SaveModelRequest {
                meter_id: meter_id.clone(),
                frequency: freq,
                description: Some(description.to_string()),
                from_datetime: Some(data.start),
                thru_datetime: Some(data.end),
                data: Some(&data),
                model_params: None,
            },
            Some(&LogProgress),
        )
        .await?;

        let record = if options.calc_savings {
            calc_meter_savings(
                store,
                &meter_id,
                record.id,
                Some(baseline_end),
                Some(max_datetime),
                options.confidence_level,
                Some(&LogProgress),
            )
            .await?
            .0
        } else {
            record
        };
        last_model = Some(record);
    }

    let baseline_model = last_model.ok_or_else(|| Error::not_found("BaselineModel", &meter_id))?;
    info!(%meter_id, model_id = baseline_model.id, "demo sample models ready");
    Ok((site, meter, baseline_model))
}
