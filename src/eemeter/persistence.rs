//! Saving fitted models to the store and loading them back.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info};

use super::progress::ProgressObserver;
use super::reader::MeterData;
use crate::caltrack::daily::NO_CANDIDATES_WARNING;
use crate::caltrack::plot::plot_energy_signature;
use crate::caltrack::BaselineModel;
use crate::domain::{BaselineModelRecord, NewBaselineModel, DEFAULT_UOM_ID};
use crate::error::{Error, Result};
use crate::repo::Store;

#[derive(Debug, Clone, Default)]
pub struct SaveModelRequest<'a> {
    pub meter_id: String,
    pub frequency: String,
    pub description: Option<String>,
    pub from_datetime: Option<DateTime<Utc>>,
    /// Defaults to now.
    pub thru_datetime: Option<DateTime<Utc>>,
    /// Data the model was fit on; enables the energy signature plot and the unit.
    pub data: Option<&'a MeterData>,
    pub model_params: Option<serde_json::Value>,
}

/// Persists `model` as a new baseline model record.
///
/// Fails with [`Error::NoCandidates`] when the plot cannot be drawn because
/// no candidate model qualified.
pub async fn save_model(
    store: &dyn Store,
    model: &BaselineModel,
    request: SaveModelRequest<'_>,
    progress_observer: Option<&dyn ProgressObserver>,
) -> Result<BaselineModelRecord> {
    let uom_id = request
        .data
        .and_then(|d| d.meter_uom_id.clone())
        .unwrap_or_else(|| DEFAULT_UOM_ID.to_string());

    let mut plot_data = None;
    if let (Some(data), BaselineModel::UsagePerDay(daily)) = (request.data, model) {
        if let Some(observer) = progress_observer {
            observer.add_progress("Plotting model energy signature ...");
        }
        info!("plotting model");
        match plot_energy_signature(&data.meter_data, &data.temperature_data, daily) {
            Ok(svg) => plot_data = Some(svg),
            Err(e) => {
                error!(error = %e, "plotting model failed");
                error!(warnings = ?model.warnings(), "check model warnings");
                if let Some(w) = model
                    .warnings()
                    .iter()
                    .find(|w| w.qualified_name == NO_CANDIDATES_WARNING)
                {
                    return Err(Error::NoCandidates(w.description.clone()));
                }
            }
        }
    }

    if let Some(observer) = progress_observer {
        observer.add_progress("Saving model ...");
    }
    let record = store
        .insert_baseline_model(&NewBaselineModel {
            meter_id: request.meter_id,
            model_class: model.model_class().to_string(),
            data: model.to_json()?,
            frequency: request.frequency,
            description: request.description,
            from_datetime: request.from_datetime,
            thru_datetime: request.thru_datetime.unwrap_or_else(Utc::now),
            model_params: request.model_params.unwrap_or_else(|| json!({})),
            plot_data,
            uom_id,
        })
        .await?;
    info!(id = record.id, model_class = %record.model_class, "saved baseline model");
    Ok(record)
}

/// Rebuilds the fitted model of a saved record.
pub fn load_model(record: &BaselineModelRecord) -> Result<BaselineModel> {
    BaselineModel::from_json(&record.model_class, &record.data)
}
