//! Bundled sample datasets.
//!
//! The samples are generated deterministically: about two years of hourly
//! electricity usage for a building with a weekday occupancy schedule,
//! heating below 55 °F and cooling above 65 °F, and a 10 % consumption drop
//! after a project blackout period.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::series::{Aggregation, Frequency, TimeSeries};
use crate::error::{Error, Result};

pub const HOURLY_SAMPLE: &str = "il-electricity-cdd-hdd-hourly";
pub const DAILY_SAMPLE: &str = "il-electricity-cdd-hdd-daily";

const SEED: u64 = 42;
const DAYS: i64 = 810;
const SAVINGS_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub name: String,
    pub freq: Frequency,
    pub unit: String,
    pub blackout_start_date: DateTime<Utc>,
    pub blackout_end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// kWh, at the sample frequency.
    pub meter_data: TimeSeries,
    /// Hourly °F.
    pub temperature_data: TimeSeries,
    pub metadata: SampleMetadata,
}

/// Loads a sample by name.
pub fn load_sample(name: &str) -> Result<Sample> {
    let freq = match name {
        HOURLY_SAMPLE => Frequency::Hourly,
        DAILY_SAMPLE => Frequency::Daily,
        other => return Err(Error::UnknownSample(other.to_string())),
    };

    let metadata = SampleMetadata {
        name: name.to_string(),
        freq,
        unit: "kWh".to_string(),
        blackout_start_date: at(2016, 12, 26),
        blackout_end_date: at(2017, 1, 4),
    };
    let (hourly_meter, temperature_data) = generate(&metadata)?;
    let meter_data = match freq {
        Frequency::Hourly => hourly_meter,
        Frequency::Daily => hourly_meter.resample(Frequency::Daily, Aggregation::Sum),
    };
    debug!(
        sample = name,
        meter_points = meter_data.len(),
        temperature_points = temperature_data.len(),
        "loaded sample"
    );

    Ok(Sample {
        meter_data,
        temperature_data,
        metadata,
    })
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn generate(metadata: &SampleMetadata) -> Result<(TimeSeries, TimeSeries)> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let temperature_noise = Normal::new(0.0, 3.0).map_err(|e| Error::Fit(e.to_string()))?;
    let usage_noise = Normal::new(0.0, 0.15).map_err(|e| Error::Fit(e.to_string()))?;

    let start = at(2015, 11, 22);
    let mut meter = Vec::with_capacity((DAYS * 24) as usize);
    let mut temps = Vec::with_capacity((DAYS * 24) as usize);

    for h in 0..DAYS * 24 {
        let ts = start + Duration::hours(h);
        let seasonal = 52.0
            - 25.0 * (std::f64::consts::TAU * (ts.ordinal() as f64 - 20.0) / 365.25).cos();
        let diurnal = 8.0 * (std::f64::consts::TAU * (ts.hour() as f64 - 9.0) / 24.0).sin();
        let temperature = seasonal + diurnal + temperature_noise.sample(&mut rng);

        let weekday = ts.weekday().num_days_from_monday() < 5;
        let occupied = weekday && (8..18).contains(&ts.hour());
        let mut usage = 1.0
            + if occupied { 1.5 } else { 0.0 }
            + 0.05 * (55.0 - temperature).max(0.0)
            + 0.08 * (temperature - 65.0).max(0.0)
            + usage_noise.sample(&mut rng);
        if ts >= metadata.blackout_end_date {
            usage *= 1.0 - SAVINGS_FRACTION;
        }

        temps.push((ts, Some(temperature)));
        meter.push((ts, Some(usage.max(0.0))));
    }

    Ok((TimeSeries::from_points(meter), TimeSeries::from_points(temps)))
}
