//! The fitted model variants and their (de)serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::daily::UsagePerDayModelResults;
use super::hourly::HourlyModelResults;
use super::metrics::ModelMetrics;
use super::series::{Frequency, TimeSeries};
use super::ModelWarning;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "NO MODEL")]
    NoModel,
    #[serde(rename = "NO DATA")]
    NoData,
}

/// Persisted class name of a model; selects the deserializer on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum ModelClass {
    #[strum(serialize = "CalTRACKUsagePerDayModelResults")]
    UsagePerDay,
    #[strum(serialize = "CalTRACKHourlyModelResults")]
    Hourly,
}

/// Prediction for one interval. Loads are only split for daily models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub timestamp: DateTime<Utc>,
    pub predicted_usage: Option<f64>,
    pub base_load: Option<f64>,
    pub heating_load: Option<f64>,
    pub cooling_load: Option<f64>,
}

/// A fitted baseline model.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineModel {
    UsagePerDay(UsagePerDayModelResults),
    Hourly(HourlyModelResults),
}

impl BaselineModel {
    pub fn model_class(&self) -> ModelClass {
        match self {
            BaselineModel::UsagePerDay(_) => ModelClass::UsagePerDay,
            BaselineModel::Hourly(_) => ModelClass::Hourly,
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            BaselineModel::UsagePerDay(_) => Frequency::Daily,
            BaselineModel::Hourly(_) => Frequency::Hourly,
        }
    }

    pub fn warnings(&self) -> &[ModelWarning] {
        match self {
            BaselineModel::UsagePerDay(m) => &m.warnings,
            BaselineModel::Hourly(m) => &m.warnings,
        }
    }

    pub fn status(&self) -> ModelStatus {
        match self {
            BaselineModel::UsagePerDay(m) => m.status,
            BaselineModel::Hourly(m) => m.status,
        }
    }

    pub fn totals_metrics(&self) -> Option<&ModelMetrics> {
        match self {
            BaselineModel::UsagePerDay(m) => m.totals_metrics.as_ref(),
            BaselineModel::Hourly(m) => m.totals_metrics.as_ref(),
        }
    }

    /// Only the daily model has an energy signature plot.
    pub fn supports_plot(&self) -> bool {
        matches!(self, BaselineModel::UsagePerDay(_))
    }

    pub fn predict(&self, index: &[DateTime<Utc>], temperature: &TimeSeries) -> Vec<ModelPrediction> {
        match self {
            BaselineModel::UsagePerDay(m) => m.predict(index, temperature),
            BaselineModel::Hourly(m) => m.predict(index, temperature),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            BaselineModel::UsagePerDay(m) => serde_json::to_value(m)?,
            BaselineModel::Hourly(m) => serde_json::to_value(m)?,
        })
    }

    pub fn from_json(model_class: &str, data: &serde_json::Value) -> Result<Self> {
        let class: ModelClass = model_class
            .parse()
            .map_err(|_| Error::UnknownModelClass(model_class.to_string()))?;
        Ok(match class {
            ModelClass::UsagePerDay => {
                BaselineModel::UsagePerDay(serde_json::from_value(data.clone())?)
            }
            ModelClass::Hourly => BaselineModel::Hourly(serde_json::from_value(data.clone())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_class_names() {
        assert_eq!(
            ModelClass::UsagePerDay.to_string(),
            "CalTRACKUsagePerDayModelResults"
        );
        assert_eq!(
            "CalTRACKHourlyModelResults".parse::<ModelClass>().unwrap(),
            ModelClass::Hourly
        );
        assert!("CalTRACKBillingModelResults".parse::<ModelClass>().is_err());
    }

    #[test]
    fn test_from_json_unknown_class() {
        let result = BaselineModel::from_json("LinearRegression", &serde_json::json!({}));
        assert!(matches!(result, Err(Error::UnknownModelClass(name)) if name == "LinearRegression"));
    }

    #[test]
    fn test_from_json_incompatible_data() {
        let result = BaselineModel::from_json(
            "CalTRACKUsagePerDayModelResults",
            &serde_json::json!({ "status": "SUCCESS" }),
        );
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_status_serializes_with_spaces() {
        assert_eq!(
            serde_json::to_value(ModelStatus::NoModel).unwrap(),
            serde_json::json!("NO MODEL")
        );
    }
}
