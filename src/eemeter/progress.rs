use tracing::info;

/// Receives progress notifications from long running flows.
pub trait ProgressObserver: Send + Sync {
    fn set_progress(&self, current: u32, total: u32, description: &str);
    fn add_progress(&self, description: &str);
}

/// Observer that writes progress to the log.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn set_progress(&self, current: u32, total: u32, description: &str) {
        info!(current, total, "{}", description);
    }

    fn add_progress(&self, description: &str) {
        info!("{}", description);
    }
}
