mod common;

use common::*;
use mockall::{mock, predicate::eq, Sequence};
use rstest::rstest;
use seas_baseline::caltrack::{DailyFitSettings, ModelClass};
use seas_baseline::domain::PLOT_MEDIA_TYPE;
use seas_baseline::eemeter::{
    get_model_for_freq, load_model, read_meter_data, save_model, MeterData, ProgressObserver,
    ReadOptions, SaveModelRequest,
};
use seas_baseline::repo::{MemoryStore, Store};
use seas_baseline::Error;

mock! {
    pub Observer {}
    impl ProgressObserver for Observer {
        fn set_progress(&self, current: u32, total: u32, description: &str);
        fn add_progress(&self, description: &str);
    }
}

async fn fitted(freq: &str) -> (MemoryStore, MeterData) {
    let store = seeded_store(60, &[]).await;
    let meter = meter(&store).await;
    let data = read_meter_data(
        &store,
        &meter,
        &ReadOptions {
            freq: Some(freq.to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    (store, data)
}

#[rstest]
#[case("hourly", ModelClass::Hourly)]
#[case("daily", ModelClass::UsagePerDay)]
#[tokio::test]
async fn test_save_then_load_reproduces_model_json(#[case] freq: &str, #[case] class: ModelClass) {
    let (store, data) = fitted(freq).await;
    let model = get_model_for_freq(&data, freq, &DailyFitSettings::default()).unwrap();

    let record = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: freq.to_string(),
            from_datetime: Some(data.start),
            thru_datetime: Some(data.end),
            data: Some(&data),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(record.model_class, class.to_string());
    assert_eq!(record.frequency, freq);
    let stored = store.get_baseline_model(record.id).await.unwrap().unwrap();
    let loaded = load_model(&stored).unwrap();
    assert_eq!(loaded.to_json().unwrap(), model.to_json().unwrap());
    assert_eq!(loaded.model_class(), class);
}

#[tokio::test]
async fn test_daily_model_is_plotted() {
    let (store, data) = fitted("daily").await;
    let model = get_model_for_freq(&data, "daily", &DailyFitSettings::default()).unwrap();

    let mut observer = MockObserver::new();
    let mut seq = Sequence::new();
    observer
        .expect_add_progress()
        .with(eq("Plotting model energy signature ..."))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    observer
        .expect_add_progress()
        .with(eq("Saving model ..."))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let record = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "daily".to_string(),
            data: Some(&data),
            ..Default::default()
        },
        Some(&observer),
    )
    .await
    .unwrap();

    let plot = record.plot_data.unwrap();
    assert_eq!(PLOT_MEDIA_TYPE, "image/svg+xml");
    assert!(plot.starts_with("<svg"));
    assert!(plot.contains("xmlns=\"http://www.w3.org/2000/svg\""));
    assert!(plot.trim_end().ends_with("</svg>"));
}

#[tokio::test]
async fn test_hourly_model_is_not_plotted() {
    let (store, data) = fitted("hourly").await;
    let model = get_model_for_freq(&data, "hourly", &DailyFitSettings::default()).unwrap();

    let mut observer = MockObserver::new();
    observer
        .expect_add_progress()
        .with(eq("Saving model ..."))
        .times(1)
        .return_const(());

    let record = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "hourly".to_string(),
            data: Some(&data),
            ..Default::default()
        },
        Some(&observer),
    )
    .await
    .unwrap();

    assert!(record.plot_data.is_none());
}

#[rstest]
#[case(None, "energy_kWh")]
#[case(Some("energy_Wh"), "energy_Wh")]
#[tokio::test]
async fn test_save_model_always_stores_a_unit(#[case] uom: Option<&str>, #[case] expected: &str) {
    let (store, mut data) = fitted("daily").await;
    let model = get_model_for_freq(&data, "daily", &DailyFitSettings::default()).unwrap();
    data.meter_uom_id = uom.map(str::to_string);

    let record = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "daily".to_string(),
            data: Some(&data),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();
    assert_eq!(record.uom_id, expected);

    let without_data = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();
    assert_eq!(without_data.uom_id, "energy_kWh");
    assert!(without_data.plot_data.is_none());
    assert_eq!(without_data.model_params, serde_json::json!({}));
}

#[tokio::test]
async fn test_no_candidates_fails_save() {
    let (store, data) = fitted("daily").await;
    let settings = DailyFitSettings {
        fit_intercept_only: false,
        fit_cdd: false,
        fit_hdd_only: false,
        ..Default::default()
    };
    let model = get_model_for_freq(&data, "daily", &settings).unwrap();

    let result = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "daily".to_string(),
            data: Some(&data),
            ..Default::default()
        },
        None,
    )
    .await;

    assert!(matches!(result, Err(Error::NoCandidates(msg)) if msg.contains("No qualified model candidates")));
    assert!(store.baseline_models(METER_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_unknown_model_class() {
    let (store, data) = fitted("daily").await;
    let model = get_model_for_freq(&data, "daily", &DailyFitSettings::default()).unwrap();
    let mut record = save_model(
        &store,
        &model,
        SaveModelRequest {
            meter_id: METER_ID.to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    record.model_class = "CalTRACKBillingModelResults".to_string();
    assert!(matches!(load_model(&record), Err(Error::UnknownModelClass(_))));
}
