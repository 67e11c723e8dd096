use thiserror::Error;

/// Errors raised by the baseline modeling flows.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Model frequency must be hourly or daily, got {0:?}")]
    UnsupportedFrequency(String),

    #[error("No meter data found for meter {meter_id}")]
    NoMeterData { meter_id: String },

    #[error("No baseline data found. Data must have at least one row")]
    NoBaselineData,

    #[error("No reporting data found. Data must have at least one row")]
    NoReportingData,

    #[error("{0}")]
    NoCandidates(String),

    #[error("Unknown model class: {0}")]
    UnknownModelClass(String),

    #[error("Unknown sample dataset: {0}")]
    UnknownSample(String),

    #[error("Model fit failed: {0}")]
    Fit(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "db")]
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
