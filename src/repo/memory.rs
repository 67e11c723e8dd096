use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::Store;
use crate::domain::{
    BaselineModelRecord, Meter, MeterHistory, MeterProduction, NewBaselineModel,
    NewMeterProduction, Site, SiteWeatherStation, WeatherHistory, WeatherStation,
};
use crate::error::{Error, Result};

#[derive(Default)]
struct Tables {
    sites: Vec<Site>,
    weather_stations: Vec<WeatherStation>,
    site_weather_stations: Vec<SiteWeatherStation>,
    weather_history: Vec<WeatherHistory>,
    meters: Vec<Meter>,
    meter_history: Vec<MeterHistory>,
    baseline_models: Vec<BaselineModelRecord>,
    meter_productions: Vec<MeterProduction>,
    next_model_id: i64,
    next_production_id: i64,
}

/// In-process store. Used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_range(ts: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_site(&self, site_id: &str) -> Result<Option<Site>> {
        let tables = self.tables.lock();
        Ok(tables
            .sites
            .iter()
            .find(|s| s.object_id.as_deref() == Some(site_id))
            .or_else(|| tables.sites.iter().find(|s| s.entity_id == site_id))
            .cloned())
    }

    async fn insert_site(&self, site: &Site) -> Result<()> {
        self.tables.lock().sites.push(site.clone());
        Ok(())
    }

    async fn get_weather_station(&self, weather_station_id: &str) -> Result<Option<WeatherStation>> {
        Ok(self
            .tables
            .lock()
            .weather_stations
            .iter()
            .find(|w| w.weather_station_id == weather_station_id)
            .cloned())
    }

    async fn insert_weather_station(&self, station: &WeatherStation) -> Result<()> {
        self.tables.lock().weather_stations.push(station.clone());
        Ok(())
    }

    async fn link_site_weather_station(&self, link: &SiteWeatherStation) -> Result<()> {
        self.tables.lock().site_weather_stations.push(link.clone());
        Ok(())
    }

    async fn site_weather_stations(&self, site_id: &str) -> Result<Vec<SiteWeatherStation>> {
        Ok(self
            .tables
            .lock()
            .site_weather_stations
            .iter()
            .filter(|l| l.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn delete_weather_history(&self, weather_station_id: &str) -> Result<u64> {
        let mut tables = self.tables.lock();
        let before = tables.weather_history.len();
        tables
            .weather_history
            .retain(|w| w.weather_station_id != weather_station_id);
        Ok((before - tables.weather_history.len()) as u64)
    }

    async fn insert_weather_history(&self, rows: &[WeatherHistory]) -> Result<()> {
        self.tables.lock().weather_history.extend_from_slice(rows);
        debug!(rows = rows.len(), "inserted weather history");
        Ok(())
    }

    async fn weather_history(
        &self,
        weather_station_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<WeatherHistory>> {
        let mut rows: Vec<WeatherHistory> = self
            .tables
            .lock()
            .weather_history
            .iter()
            .filter(|w| w.weather_station_id == weather_station_id)
            .filter(|w| in_range(w.as_of_datetime, start, end))
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.as_of_datetime);
        Ok(rows)
    }

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>> {
        Ok(self
            .tables
            .lock()
            .meters
            .iter()
            .find(|m| m.meter_id == meter_id)
            .cloned())
    }

    async fn insert_meter(&self, meter: &Meter) -> Result<()> {
        self.tables.lock().meters.push(meter.clone());
        Ok(())
    }

    async fn site_meters(&self, site_id: &str) -> Result<Vec<Meter>> {
        Ok(self
            .tables
            .lock()
            .meters
            .iter()
            .filter(|m| m.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn delete_meter(&self, meter_id: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.meter_productions.retain(|p| p.meter_id != meter_id);
        tables.baseline_models.retain(|m| m.meter_id != meter_id);
        tables.meter_history.retain(|h| h.meter_id != meter_id);
        tables.meters.retain(|m| m.meter_id != meter_id);
        Ok(())
    }

    async fn insert_meter_history(&self, rows: &[MeterHistory]) -> Result<()> {
        self.tables.lock().meter_history.extend_from_slice(rows);
        debug!(rows = rows.len(), "inserted meter history");
        Ok(())
    }

    async fn meter_history(
        &self,
        meter_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterHistory>> {
        let mut rows: Vec<MeterHistory> = self
            .tables
            .lock()
            .meter_history
            .iter()
            .filter(|h| h.meter_id == meter_id)
            .filter(|h| in_range(h.as_of_datetime, start, end))
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.as_of_datetime);
        Ok(rows)
    }

    async fn insert_baseline_model(&self, model: &NewBaselineModel) -> Result<BaselineModelRecord> {
        let mut tables = self.tables.lock();
        tables.next_model_id += 1;
        let record = BaselineModelRecord {
            id: tables.next_model_id,
            meter_id: model.meter_id.clone(),
            model_class: model.model_class.clone(),
            data: model.data.clone(),
            frequency: model.frequency.clone(),
            description: model.description.clone(),
            from_datetime: model.from_datetime,
            thru_datetime: model.thru_datetime,
            model_params: model.model_params.clone(),
            plot_data: model.plot_data.clone(),
            uom_id: model.uom_id.clone(),
            last_calc_saving_datetime: None,
            created_datetime: Utc::now(),
        };
        tables.baseline_models.push(record.clone());
        Ok(record)
    }

    async fn get_baseline_model(&self, id: i64) -> Result<Option<BaselineModelRecord>> {
        Ok(self
            .tables
            .lock()
            .baseline_models
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn baseline_models(&self, meter_id: &str) -> Result<Vec<BaselineModelRecord>> {
        Ok(self
            .tables
            .lock()
            .baseline_models
            .iter()
            .filter(|m| m.meter_id == meter_id)
            .cloned()
            .collect())
    }

    async fn set_last_calc_saving_datetime(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<BaselineModelRecord> {
        let mut tables = self.tables.lock();
        let model = tables
            .baseline_models
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::not_found("BaselineModel", id))?;
        model.last_calc_saving_datetime = Some(at);
        Ok(model.clone())
    }

    async fn insert_meter_productions(&self, rows: &[NewMeterProduction]) -> Result<u64> {
        let mut tables = self.tables.lock();
        let created_datetime = Utc::now();
        for row in rows {
            tables.next_production_id += 1;
            let id = tables.next_production_id;
            tables.meter_productions.push(MeterProduction {
                id,
                meter_id: row.meter_id.clone(),
                from_datetime: row.from_datetime,
                thru_datetime: row.thru_datetime,
                meter_production_type: row.meter_production_type.clone(),
                meter_production_reference: row.meter_production_reference.clone(),
                error_bands: row.error_bands.clone(),
                model_baseline_value: row.model_baseline_value,
                actual_value: row.actual_value,
                net_value: row.net_value,
                uom_id: row.uom_id.clone(),
                source: row.source.clone(),
                created_datetime,
            });
        }
        Ok(rows.len() as u64)
    }

    async fn meter_productions(&self, meter_id: &str) -> Result<Vec<MeterProduction>> {
        Ok(self
            .tables
            .lock()
            .meter_productions
            .iter()
            .filter(|p| p.meter_id == meter_id)
            .cloned()
            .collect())
    }
}
