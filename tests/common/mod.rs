#![allow(dead_code)]

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use seas_baseline::domain::{
    Meter, MeterHistory, Site, SiteWeatherStation, WeatherHistory, WeatherStation,
};
use seas_baseline::repo::{MemoryStore, Store};

pub const SITE_ID: &str = "site-1";
pub const METER_ID: &str = "meter-1";
pub const STATION_ID: &str = "ws-1";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
}

pub fn temperature_at(ts: DateTime<Utc>) -> f64 {
    let day = ts.ordinal() as f64;
    let hour = ts.hour() as f64;
    50.0 - 25.0 * (std::f64::consts::TAU * (day - 20.0) / 365.0).cos()
        + 6.0 * (std::f64::consts::TAU * (hour - 9.0) / 24.0).sin()
}

pub fn usage_at(ts: DateTime<Utc>) -> f64 {
    let t = temperature_at(ts);
    let occupied = ts.weekday().num_days_from_monday() < 5 && (8..18).contains(&ts.hour());
    let jitter = ((ts.timestamp() / 3600) % 7) as f64 * 0.03;
    1.0 + if occupied { 1.5 } else { 0.0 }
        + 0.05 * (55.0 - t).max(0.0)
        + 0.08 * (t - 65.0).max(0.0)
        + jitter
}

pub async fn store_with_site() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_site(&Site {
            entity_id: SITE_ID.to_string(),
            object_id: Some("site-object-1".to_string()),
            description: Some("Test Site".to_string()),
        })
        .await
        .unwrap();
    store
}

/// Site, weather station linked to the site, and a meter without its own
/// station, with `days` of hourly readings. Hours in `skip` get no reading.
pub async fn seeded_store(days: i64, skip: &[DateTime<Utc>]) -> MemoryStore {
    let store = store_with_site().await;
    store
        .insert_weather_station(&WeatherStation {
            weather_station_id: STATION_ID.to_string(),
            station_name: Some("Test Station".to_string()),
            source: None,
            elevation_uom_id: None,
        })
        .await
        .unwrap();
    store
        .link_site_weather_station(&SiteWeatherStation {
            site_id: SITE_ID.to_string(),
            weather_station_id: STATION_ID.to_string(),
            source: None,
        })
        .await
        .unwrap();
    store
        .insert_meter(&Meter {
            meter_id: METER_ID.to_string(),
            site_id: SITE_ID.to_string(),
            description: None,
            account_number: None,
            utility_id: None,
            weather_station_id: None,
        })
        .await
        .unwrap();

    let hours: Vec<DateTime<Utc>> = (0..days * 24).map(|h| start() + Duration::hours(h)).collect();
    let weather: Vec<WeatherHistory> = hours
        .iter()
        .map(|ts| WeatherHistory::from_fahrenheit(STATION_ID, *ts, temperature_at(*ts), None))
        .collect();
    store.insert_weather_history(&weather).await.unwrap();

    let readings: Vec<MeterHistory> = hours
        .iter()
        .filter(|ts| !skip.contains(ts))
        .map(|ts| MeterHistory {
            meter_id: METER_ID.to_string(),
            as_of_datetime: *ts,
            value: usage_at(*ts),
            uom_id: Some("energy_kWh".to_string()),
            source: None,
        })
        .collect();
    store.insert_meter_history(&readings).await.unwrap();
    store
}

pub async fn meter(store: &MemoryStore) -> Meter {
    store.get_meter(METER_ID).await.unwrap().unwrap()
}
