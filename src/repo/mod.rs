//! Persistence of sites, meters, weather data, baseline models and productions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BaselineModelRecord, Meter, MeterHistory, MeterProduction, NewBaselineModel,
    NewMeterProduction, Site, SiteWeatherStation, WeatherHistory, WeatherStation,
};
use crate::error::Result;

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use pg::PgStore;

/// Storage used by the baseline flows.
///
/// Time ranges are inclusive on both ends; `None` leaves that side open.
/// History queries return rows ordered by `as_of_datetime`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Site by `object_id`, falling back to `entity_id`.
    async fn find_site(&self, site_id: &str) -> Result<Option<Site>>;
    async fn insert_site(&self, site: &Site) -> Result<()>;

    async fn get_weather_station(&self, weather_station_id: &str) -> Result<Option<WeatherStation>>;
    async fn insert_weather_station(&self, station: &WeatherStation) -> Result<()>;
    async fn link_site_weather_station(&self, link: &SiteWeatherStation) -> Result<()>;
    async fn site_weather_stations(&self, site_id: &str) -> Result<Vec<SiteWeatherStation>>;

    /// Returns the number of rows removed.
    async fn delete_weather_history(&self, weather_station_id: &str) -> Result<u64>;
    async fn insert_weather_history(&self, rows: &[WeatherHistory]) -> Result<()>;
    async fn weather_history(
        &self,
        weather_station_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<WeatherHistory>>;

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>>;
    async fn insert_meter(&self, meter: &Meter) -> Result<()>;
    async fn site_meters(&self, site_id: &str) -> Result<Vec<Meter>>;
    /// Deletes the meter with its history, baseline models and productions.
    async fn delete_meter(&self, meter_id: &str) -> Result<()>;

    async fn insert_meter_history(&self, rows: &[MeterHistory]) -> Result<()>;
    async fn meter_history(
        &self,
        meter_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterHistory>>;

    async fn insert_baseline_model(&self, model: &NewBaselineModel) -> Result<BaselineModelRecord>;
    async fn get_baseline_model(&self, id: i64) -> Result<Option<BaselineModelRecord>>;
    async fn baseline_models(&self, meter_id: &str) -> Result<Vec<BaselineModelRecord>>;
    /// Advances `last_calc_saving_datetime`; the only mutation of a saved model.
    async fn set_last_calc_saving_datetime(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<BaselineModelRecord>;

    /// Returns the number of rows inserted.
    async fn insert_meter_productions(&self, rows: &[NewMeterProduction]) -> Result<u64>;
    async fn meter_productions(&self, meter_id: &str) -> Result<Vec<MeterProduction>>;
}
