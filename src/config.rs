use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use validator::Validate;

use crate::caltrack::savings::DEFAULT_CONFIDENCE_LEVEL;
use crate::eemeter::DemoOptions;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub db: DbConfig,
    #[validate(nested)]
    pub demo: DemoConfig,
    #[serde(default)]
    #[validate(nested)]
    pub modeling: ModelingConfig,
}

/// Without a url the in-memory store is used.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DbConfig {
    pub url: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: None, max_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DemoConfig {
    #[validate(length(min = 1))]
    pub site_id: String,
    /// Description of the site created when it does not exist yet.
    pub site_description: Option<String>,
    pub meter_id: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub calc_savings: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ModelingConfig {
    /// Confidence level of the savings error bands.
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub confidence_level: f64,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self { confidence_level: DEFAULT_CONFIDENCE_LEVEL }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("SEAS__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration failed validation")?;
        Ok(cfg)
    }

    pub fn demo_options(&self) -> DemoOptions {
        DemoOptions {
            site_id: self.demo.site_id.clone(),
            meter_id: self.demo.meter_id.clone(),
            description: self.demo.description.clone(),
            calc_savings: self.demo.calc_savings,
            confidence_level: self.modeling.confidence_level,
        }
    }
}
