//! Baseline modeling flows for stored meters.
//!
//! Reads meter and weather history from a [`Store`](crate::repo::Store), fits
//! CalTRACK models through [`crate::caltrack`], persists them and turns their
//! metered savings into meter production rows. The flows are sequential; each
//! awaits one store call at a time.

pub mod builder;
pub mod demo;
pub mod persistence;
pub mod progress;
pub mod reader;
pub mod savings;

pub use builder::{get_daily_model, get_hourly_model, get_model_for_freq};
pub use demo::{setup_demo_sample_models, DemoOptions, SAMPLE_WEATHER_STATION_ID};
pub use persistence::{load_model, save_model, SaveModelRequest};
pub use progress::{LogProgress, ProgressObserver};
pub use reader::{
    get_daily_sample_data, get_hourly_sample_data, meter_weather_station, read_meter_data,
    read_sample_data, MeterData, ReadOptions,
};
pub use savings::{calc_meter_savings, get_savings, Savings};
