//! Metered savings of a saved model, persisted as meter productions.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use super::progress::ProgressObserver;
use super::reader::{read_meter_data, MeterData, ReadOptions, MAX_PERIOD_DAYS};
use super::persistence::load_model;
use crate::caltrack::{get_reporting_data, metered_savings, BaselineModel, ErrorBands, SavingsRow, TimeSeries};
use crate::domain::{BaselineModelRecord, NewMeterProduction, EEMETER_SAVINGS_TYPE};
use crate::error::{Error, Result};
use crate::repo::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct Savings {
    pub reporting_meter_data: TimeSeries,
    pub total_savings: f64,
    pub metered_savings: Vec<SavingsRow>,
    pub error_bands: Option<ErrorBands>,
}

/// Savings over at most a year of reporting data starting at the blackout end.
pub fn get_savings(
    data: &MeterData,
    model: &BaselineModel,
    confidence_level: f64,
) -> Result<Savings> {
    let (reporting_meter_data, _warnings) = get_reporting_data(
        &data.meter_data,
        data.blackout_end_date,
        None,
        Some(MAX_PERIOD_DAYS),
    )?;
    let savings = metered_savings(
        model,
        &reporting_meter_data,
        &data.temperature_data,
        true,
        confidence_level,
    );

    Ok(Savings {
        reporting_meter_data,
        total_savings: savings.total_savings(),
        metered_savings: savings.rows,
        error_bands: savings.error_bands,
    })
}

/// Computes the savings of model `model_id` for meter `meter_id` over
/// `[start, end]` and stores one production per interval with a defined value.
///
/// Running it twice stores the rows twice.
pub async fn calc_meter_savings(
    store: &dyn Store,
    meter_id: &str,
    model_id: i64,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    confidence_level: f64,
    progress_observer: Option<&dyn ProgressObserver>,
) -> Result<(BaselineModelRecord, Savings)> {
    info!(meter_id, model_id, ?start, ?end, "calculating meter savings");

    let meter = store
        .get_meter(meter_id)
        .await?
        .ok_or_else(|| Error::not_found("Meter", meter_id))?;
    let record = store
        .get_baseline_model(model_id)
        .await?
        .ok_or_else(|| Error::not_found("BaselineModel", model_id))?;

    if let Some(observer) = progress_observer {
        observer.set_progress(1, 4, "Load model ...");
    }
    let model = load_model(&record)?;
    let data = read_meter_data(
        store,
        &meter,
        &ReadOptions {
            freq: Some(record.frequency.clone()),
            start,
            end,
            ..Default::default()
        },
    )
    .await?;

    let savings = get_savings(&data, &model, confidence_level)?;
    info!(
        total_savings = savings.total_savings,
        rows = savings.metered_savings.len(),
        "got savings"
    );

    if !savings.metered_savings.is_empty() {
        if let Some(observer) = progress_observer {
            observer.add_progress("Create Meter Productions ...");
        }
        let error_bands = savings
            .error_bands
            .map(serde_json::to_value)
            .transpose()?;
        let delta = record.frequency_delta();
        let source = format!("{}:{}", record.id, record.model_class);

        let rows: Vec<NewMeterProduction> = savings
            .metered_savings
            .iter()
            .filter_map(|row| {
                let net_value = row.metered_savings.filter(|v| !v.is_nan())?;
                Some(NewMeterProduction {
                    meter_id: meter.meter_id.clone(),
                    from_datetime: row.timestamp,
                    thru_datetime: row.timestamp + delta,
                    meter_production_type: EEMETER_SAVINGS_TYPE.to_string(),
                    meter_production_reference: json!({ "BaselineModel.id": record.id }),
                    error_bands: error_bands.clone(),
                    model_baseline_value: row.counterfactual_usage,
                    actual_value: row.reporting_observed,
                    net_value,
                    uom_id: record.uom_id.clone(),
                    source: source.clone(),
                })
            })
            .collect();
        let inserted = store.insert_meter_productions(&rows).await?;
        info!(inserted, "created meter productions");
    }

    let updated = match end {
        Some(end) => store.set_last_calc_saving_datetime(record.id, end).await?,
        None => record,
    };
    Ok((updated, savings))
}
