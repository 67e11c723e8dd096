#![cfg(feature = "db")]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

use super::Store;
use crate::domain::{
    BaselineModelRecord, Meter, MeterHistory, MeterProduction, NewBaselineModel,
    NewMeterProduction, Site, SiteWeatherStation, WeatherHistory, WeatherStation,
};
use crate::error::{Error, Result};

const BASELINE_MODEL_COLUMNS: &str = "id, meter_id, model_class, data, frequency, description, \
     from_datetime, thru_datetime, model_params, plot_data, uom_id, \
     last_calc_saving_datetime, created_datetime";

/// Postgres store. Schema lives in `migrations/`.
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "connected to database");
        Ok(Self { pool })
    }

    /// Applies pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_site(&self, site_id: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            SELECT entity_id, object_id, description
            FROM sites
            WHERE object_id = $1 OR entity_id = $1
            ORDER BY (object_id = $1) DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }

    async fn insert_site(&self, site: &Site) -> Result<()> {
        sqlx::query("INSERT INTO sites (entity_id, object_id, description) VALUES ($1, $2, $3)")
            .bind(&site.entity_id)
            .bind(&site.object_id)
            .bind(&site.description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_weather_station(&self, weather_station_id: &str) -> Result<Option<WeatherStation>> {
        let station = sqlx::query_as::<_, WeatherStation>(
            r#"
            SELECT weather_station_id, station_name, source, elevation_uom_id
            FROM weather_stations
            WHERE weather_station_id = $1
            "#,
        )
        .bind(weather_station_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(station)
    }

    async fn insert_weather_station(&self, station: &WeatherStation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO weather_stations (weather_station_id, station_name, source, elevation_uom_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&station.weather_station_id)
        .bind(&station.station_name)
        .bind(&station.source)
        .bind(&station.elevation_uom_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_site_weather_station(&self, link: &SiteWeatherStation) -> Result<()> {
        sqlx::query(
            "INSERT INTO site_weather_stations (site_id, weather_station_id, source) VALUES ($1, $2, $3)",
        )
        .bind(&link.site_id)
        .bind(&link.weather_station_id)
        .bind(&link.source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn site_weather_stations(&self, site_id: &str) -> Result<Vec<SiteWeatherStation>> {
        let links = sqlx::query_as::<_, SiteWeatherStation>(
            r#"
            SELECT site_id, weather_station_id, source
            FROM site_weather_stations
            WHERE site_id = $1
            ORDER BY id
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn delete_weather_history(&self, weather_station_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM weather_history WHERE weather_station_id = $1")
            .bind(weather_station_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_weather_history(&self, rows: &[WeatherHistory]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO weather_history (weather_station_id, as_of_datetime, temp_f, temp_c, source)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&row.weather_station_id)
            .bind(row.as_of_datetime)
            .bind(row.temp_f)
            .bind(row.temp_c)
            .bind(&row.source)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = rows.len(), "inserted weather history");
        Ok(())
    }

    async fn weather_history(
        &self,
        weather_station_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<WeatherHistory>> {
        let rows = sqlx::query_as::<_, WeatherHistory>(
            r#"
            SELECT weather_station_id, as_of_datetime, temp_f, temp_c, source
            FROM weather_history
            WHERE weather_station_id = $1
              AND ($2::timestamptz IS NULL OR as_of_datetime >= $2)
              AND ($3::timestamptz IS NULL OR as_of_datetime <= $3)
            ORDER BY as_of_datetime
            "#,
        )
        .bind(weather_station_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>> {
        let meter = sqlx::query_as::<_, Meter>(
            r#"
            SELECT meter_id, site_id, description, account_number, utility_id, weather_station_id
            FROM meters
            WHERE meter_id = $1
            "#,
        )
        .bind(meter_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(meter)
    }

    async fn insert_meter(&self, meter: &Meter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meters (meter_id, site_id, description, account_number, utility_id, weather_station_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&meter.meter_id)
        .bind(&meter.site_id)
        .bind(&meter.description)
        .bind(&meter.account_number)
        .bind(&meter.utility_id)
        .bind(&meter.weather_station_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn site_meters(&self, site_id: &str) -> Result<Vec<Meter>> {
        let meters = sqlx::query_as::<_, Meter>(
            r#"
            SELECT meter_id, site_id, description, account_number, utility_id, weather_station_id
            FROM meters
            WHERE site_id = $1
            ORDER BY meter_id
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(meters)
    }

    async fn delete_meter(&self, meter_id: &str) -> Result<()> {
        // History, models and productions go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM meters WHERE meter_id = $1")
            .bind(meter_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_meter_history(&self, rows: &[MeterHistory]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO meter_history (meter_id, as_of_datetime, value, uom_id, source)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&row.meter_id)
            .bind(row.as_of_datetime)
            .bind(row.value)
            .bind(&row.uom_id)
            .bind(&row.source)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = rows.len(), "inserted meter history");
        Ok(())
    }

    async fn meter_history(
        &self,
        meter_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterHistory>> {
        let rows = sqlx::query_as::<_, MeterHistory>(
            r#"
            SELECT meter_id, as_of_datetime, value, uom_id, source
            FROM meter_history
            WHERE meter_id = $1
              AND ($2::timestamptz IS NULL OR as_of_datetime >= $2)
              AND ($3::timestamptz IS NULL OR as_of_datetime <= $3)
            ORDER BY as_of_datetime
            "#,
        )
        .bind(meter_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_baseline_model(&self, model: &NewBaselineModel) -> Result<BaselineModelRecord> {
        let query = format!(
            r#"
            INSERT INTO baseline_models
                (meter_id, model_class, data, frequency, description, from_datetime,
                 thru_datetime, model_params, plot_data, uom_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            BASELINE_MODEL_COLUMNS
        );
        let record = sqlx::query_as::<_, BaselineModelRecord>(&query)
            .bind(&model.meter_id)
            .bind(&model.model_class)
            .bind(&model.data)
            .bind(&model.frequency)
            .bind(&model.description)
            .bind(model.from_datetime)
            .bind(model.thru_datetime)
            .bind(&model.model_params)
            .bind(&model.plot_data)
            .bind(&model.uom_id)
            .fetch_one(&self.pool)
            .await?;
        info!(id = record.id, meter_id = %record.meter_id, "saved baseline model");
        Ok(record)
    }

    async fn get_baseline_model(&self, id: i64) -> Result<Option<BaselineModelRecord>> {
        let query = format!("SELECT {} FROM baseline_models WHERE id = $1", BASELINE_MODEL_COLUMNS);
        let record = sqlx::query_as::<_, BaselineModelRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn baseline_models(&self, meter_id: &str) -> Result<Vec<BaselineModelRecord>> {
        let query = format!(
            "SELECT {} FROM baseline_models WHERE meter_id = $1 ORDER BY id",
            BASELINE_MODEL_COLUMNS
        );
        let records = sqlx::query_as::<_, BaselineModelRecord>(&query)
            .bind(meter_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn set_last_calc_saving_datetime(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<BaselineModelRecord> {
        let query = format!(
            "UPDATE baseline_models SET last_calc_saving_datetime = $2 WHERE id = $1 RETURNING {}",
            BASELINE_MODEL_COLUMNS
        );
        sqlx::query_as::<_, BaselineModelRecord>(&query)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("BaselineModel", id))
    }

    async fn insert_meter_productions(&self, rows: &[NewMeterProduction]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO meter_productions
                    (meter_id, from_datetime, thru_datetime, meter_production_type,
                     meter_production_reference, error_bands, model_baseline_value,
                     actual_value, net_value, uom_id, source)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&row.meter_id)
            .bind(row.from_datetime)
            .bind(row.thru_datetime)
            .bind(&row.meter_production_type)
            .bind(&row.meter_production_reference)
            .bind(&row.error_bands)
            .bind(row.model_baseline_value)
            .bind(row.actual_value)
            .bind(row.net_value)
            .bind(&row.uom_id)
            .bind(&row.source)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = rows.len(), "inserted meter productions");
        Ok(rows.len() as u64)
    }

    async fn meter_productions(&self, meter_id: &str) -> Result<Vec<MeterProduction>> {
        let rows = sqlx::query_as::<_, MeterProduction>(
            r#"
            SELECT id, meter_id, from_datetime, thru_datetime, meter_production_type,
                   meter_production_reference, error_bands, model_baseline_value,
                   actual_value, net_value, uom_id, source, created_datetime
            FROM meter_productions
            WHERE meter_id = $1
            ORDER BY from_datetime, id
            "#,
        )
        .bind(meter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
