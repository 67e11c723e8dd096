mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use mockall::{mock, predicate::eq, Sequence};
use rstest::rstest;
use seas_baseline::caltrack::DailyFitSettings;
use seas_baseline::domain::{BaselineModelRecord, EEMETER_SAVINGS_TYPE};
use seas_baseline::eemeter::{
    calc_meter_savings, get_model_for_freq, read_meter_data, save_model, ProgressObserver,
    ReadOptions, SaveModelRequest,
};
use seas_baseline::repo::{MemoryStore, Store};
use seas_baseline::Error;

const CONFIDENCE_LEVEL: f64 = 0.90;

mock! {
    pub Observer {}
    impl ProgressObserver for Observer {
        fn set_progress(&self, current: u32, total: u32, description: &str);
        fn add_progress(&self, description: &str);
    }
}

fn baseline_end() -> DateTime<Utc> {
    start() + Duration::days(60) - Duration::hours(1)
}

fn reporting_start() -> DateTime<Utc> {
    start() + Duration::days(60)
}

fn reporting_end() -> DateTime<Utc> {
    start() + Duration::days(90) - Duration::hours(1)
}

/// Store with 90 days of data and a model fit on the first 60.
async fn store_with_model(freq: &str) -> (MemoryStore, BaselineModelRecord) {
    let store = seeded_store(90, &[]).await;
    let record = fit_and_save(&store, freq).await;
    (store, record)
}

async fn fit_and_save(store: &MemoryStore, freq: &str) -> BaselineModelRecord {
    let meter = meter(store).await;
    let data = read_meter_data(
        store,
        &meter,
        &ReadOptions {
            freq: Some(freq.to_string()),
            end: Some(baseline_end()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let model = get_model_for_freq(&data, freq, &DailyFitSettings::default()).unwrap();
    save_model(
        store,
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
    .unwrap()
}

#[rstest]
#[case("daily", Duration::days(1))]
#[case("hourly", Duration::hours(1))]
#[tokio::test]
async fn test_calc_meter_savings_stores_productions(#[case] freq: &str, #[case] delta: Duration) {
    let (store, record) = store_with_model(freq).await;

    let (updated, savings) = calc_meter_savings(
        &store,
        METER_ID,
        record.id,
        Some(reporting_start()),
        Some(reporting_end()),
        CONFIDENCE_LEVEL,
        None,
    )
    .await
    .unwrap();

    assert_eq!(updated.id, record.id);
    assert_eq!(updated.last_calc_saving_datetime, Some(reporting_end()));
    assert_eq!(
        store
            .get_baseline_model(record.id)
            .await
            .unwrap()
            .unwrap()
            .last_calc_saving_datetime,
        Some(reporting_end())
    );

    let defined = savings
        .metered_savings
        .iter()
        .filter(|row| row.metered_savings.is_some_and(|v| !v.is_nan()))
        .count();
    let productions = store.meter_productions(METER_ID).await.unwrap();
    assert!(defined > 0);
    assert_eq!(productions.len(), defined);

    let source = format!("{}:{}", record.id, record.model_class);
    for production in &productions {
        assert!(!production.net_value.is_nan());
        assert_eq!(production.thru_datetime - production.from_datetime, delta);
        assert!(production.from_datetime >= reporting_start());
        assert_eq!(production.meter_production_type, EEMETER_SAVINGS_TYPE);
        assert_eq!(
            production.meter_production_reference,
            serde_json::json!({ "BaselineModel.id": record.id })
        );
        assert_eq!(production.source, source);
        assert_eq!(production.uom_id, record.uom_id);
    }

    let total: f64 = productions.iter().map(|p| p.net_value).sum();
    assert!((total - savings.total_savings).abs() < 1e-6 * savings.total_savings.abs().max(1.0));
}

#[tokio::test]
async fn test_calc_meter_savings_skips_undefined_savings() {
    let missing_day = start() + Duration::days(70);
    let gap: Vec<DateTime<Utc>> = (0..24).map(|h| missing_day + Duration::hours(h)).collect();
    let store = seeded_store(90, &gap).await;
    let record = fit_and_save(&store, "daily").await;

    let (_, savings) = calc_meter_savings(
        &store,
        METER_ID,
        record.id,
        Some(reporting_start()),
        Some(reporting_end()),
        CONFIDENCE_LEVEL,
        None,
    )
    .await
    .unwrap();

    let undefined = savings
        .metered_savings
        .iter()
        .filter(|row| row.metered_savings.map_or(true, f64::is_nan))
        .count();
    assert_eq!(savings.metered_savings.len(), 30);
    assert_eq!(undefined, 1);

    let productions = store.meter_productions(METER_ID).await.unwrap();
    assert_eq!(productions.len(), savings.metered_savings.len() - undefined);
    assert!(productions.iter().all(|p| p.from_datetime != missing_day));
}

#[tokio::test]
async fn test_calc_meter_savings_reports_progress() {
    let (store, record) = store_with_model("daily").await;

    let mut observer = MockObserver::new();
    let mut seq = Sequence::new();
    observer
        .expect_set_progress()
        .with(eq(1), eq(4), eq("Load model ..."))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    observer
        .expect_add_progress()
        .with(eq("Create Meter Productions ..."))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    calc_meter_savings(
        &store,
        METER_ID,
        record.id,
        Some(reporting_start()),
        Some(reporting_end()),
        CONFIDENCE_LEVEL,
        Some(&observer),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_open_ended_run_keeps_last_calc_datetime() {
    let (store, record) = store_with_model("daily").await;

    let (updated, _) = calc_meter_savings(
        &store,
        METER_ID,
        record.id,
        Some(reporting_start()),
        None,
        CONFIDENCE_LEVEL,
        None,
    )
    .await
    .unwrap();

    assert!(updated.last_calc_saving_datetime.is_none());
    assert!(!store.meter_productions(METER_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_running_twice_duplicates_productions() {
    let (store, record) = store_with_model("daily").await;
    let run = || {
        calc_meter_savings(
            &store,
            METER_ID,
            record.id,
            Some(reporting_start()),
            Some(reporting_end()),
            CONFIDENCE_LEVEL,
            None,
        )
    };

    run().await.unwrap();
    let first = store.meter_productions(METER_ID).await.unwrap().len();
    run().await.unwrap();
    let second = store.meter_productions(METER_ID).await.unwrap().len();

    assert_eq!(second, 2 * first);
}

#[tokio::test]
async fn test_unknown_meter_or_model() {
    let (store, record) = store_with_model("daily").await;

    let result = calc_meter_savings(&store, "no-such-meter", record.id, None, None, CONFIDENCE_LEVEL, None).await;
    assert!(matches!(result, Err(Error::NotFound { entity: "Meter", .. })));

    let result = calc_meter_savings(&store, METER_ID, record.id + 100, None, None, CONFIDENCE_LEVEL, None).await;
    assert!(matches!(result, Err(Error::NotFound { entity: "BaselineModel", .. })));
}
