//! CalTRACK baseline models and metered savings for SEAS meters.
//!
//! [`caltrack`] holds the analytics, [`eemeter`] the flows that read from and
//! write to a [`repo::Store`].

pub mod caltrack;
pub mod config;
pub mod domain;
pub mod eemeter;
pub mod error;
pub mod repo;
pub mod telemetry;

pub use error::{Error, Result};
