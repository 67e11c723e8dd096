//! Persisted records of the meter and weather data model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::caltrack::Frequency;

/// Unit of measure stored when a meter's readings carry none.
pub const DEFAULT_UOM_ID: &str = "energy_kWh";

/// Media type of `plot_data`: an uncompressed SVG document, not base64.
pub const PLOT_MEDIA_TYPE: &str = "image/svg+xml";

/// Production type of savings rows written by the savings calculator.
pub const EEMETER_SAVINGS_TYPE: &str = "EEMeter Savings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Site {
    pub entity_id: String,
    pub object_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WeatherStation {
    pub weather_station_id: String,
    pub station_name: Option<String>,
    pub source: Option<String>,
    pub elevation_uom_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SiteWeatherStation {
    pub site_id: String,
    pub weather_station_id: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Meter {
    pub meter_id: String,
    pub site_id: String,
    pub description: Option<String>,
    pub account_number: Option<String>,
    pub utility_id: Option<String>,
    pub weather_station_id: Option<String>,
}

/// One meter reading. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct MeterHistory {
    pub meter_id: String,
    pub as_of_datetime: DateTime<Utc>,
    pub value: f64,
    pub uom_id: Option<String>,
    pub source: Option<String>,
}

/// One temperature reading. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WeatherHistory {
    pub weather_station_id: String,
    pub as_of_datetime: DateTime<Utc>,
    pub temp_f: Option<f64>,
    pub temp_c: Option<f64>,
    pub source: Option<String>,
}

impl WeatherHistory {
    /// Reading from a Fahrenheit temperature; stores both units.
    pub fn from_fahrenheit(
        weather_station_id: impl Into<String>,
        as_of_datetime: DateTime<Utc>,
        temp_f: f64,
        source: Option<String>,
    ) -> Self {
        Self {
            weather_station_id: weather_station_id.into(),
            as_of_datetime,
            temp_f: Some(temp_f),
            temp_c: Some((temp_f - 32.0) * 5.0 / 9.0),
            source,
        }
    }
}

/// A persisted fitted model. `data` is the model's JSON and `model_class`
/// selects how it is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BaselineModelRecord {
    pub id: i64,
    pub meter_id: String,
    pub model_class: String,
    pub data: serde_json::Value,
    pub frequency: String,
    pub description: Option<String>,
    pub from_datetime: Option<DateTime<Utc>>,
    pub thru_datetime: DateTime<Utc>,
    pub model_params: serde_json::Value,
    /// Energy signature plot of daily models, see [`PLOT_MEDIA_TYPE`].
    pub plot_data: Option<String>,
    pub uom_id: String,
    pub last_calc_saving_datetime: Option<DateTime<Utc>>,
    pub created_datetime: DateTime<Utc>,
}

impl BaselineModelRecord {
    /// Length of one reporting interval: an hour for hourly models, a day otherwise.
    pub fn frequency_delta(&self) -> Duration {
        match self.frequency.parse::<Frequency>() {
            Ok(freq) => freq.delta(),
            Err(_) => Frequency::Daily.delta(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBaselineModel {
    pub meter_id: String,
    pub model_class: String,
    pub data: serde_json::Value,
    pub frequency: String,
    pub description: Option<String>,
    pub from_datetime: Option<DateTime<Utc>>,
    pub thru_datetime: DateTime<Utc>,
    pub model_params: serde_json::Value,
    /// Energy signature plot of daily models, see [`PLOT_MEDIA_TYPE`].
    pub plot_data: Option<String>,
    pub uom_id: String,
}

/// A computed production (savings) value over one interval. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct MeterProduction {
    pub id: i64,
    pub meter_id: String,
    pub from_datetime: DateTime<Utc>,
    pub thru_datetime: DateTime<Utc>,
    pub meter_production_type: String,
    pub meter_production_reference: serde_json::Value,
    pub error_bands: Option<serde_json::Value>,
    pub model_baseline_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub net_value: f64,
    pub uom_id: String,
    pub source: String,
    pub created_datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeterProduction {
    pub meter_id: String,
    pub from_datetime: DateTime<Utc>,
    pub thru_datetime: DateTime<Utc>,
    pub meter_production_type: String,
    pub meter_production_reference: serde_json::Value,
    pub error_bands: Option<serde_json::Value>,
    pub model_baseline_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub net_value: f64,
    pub uom_id: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(frequency: &str) -> BaselineModelRecord {
        BaselineModelRecord {
            id: 1,
            meter_id: "m".to_string(),
            model_class: "CalTRACKHourlyModelResults".to_string(),
            data: json!({}),
            frequency: frequency.to_string(),
            description: None,
            from_datetime: None,
            thru_datetime: Utc::now(),
            model_params: json!({}),
            plot_data: None,
            uom_id: DEFAULT_UOM_ID.to_string(),
            last_calc_saving_datetime: None,
            created_datetime: Utc::now(),
        }
    }

    #[test]
    fn test_frequency_delta() {
        assert_eq!(record("hourly").frequency_delta(), Duration::hours(1));
        assert_eq!(record("daily").frequency_delta(), Duration::days(1));
    }

    #[test]
    fn test_weather_history_converts_to_celsius() {
        let row = WeatherHistory::from_fahrenheit("ws", Utc::now(), 212.0, None);
        assert_eq!(row.temp_c, Some(100.0));
    }
}
