use anyhow::{Context, Result};
use seas_baseline::config::Config;
use seas_baseline::domain::Site;
use seas_baseline::eemeter::setup_demo_sample_models;
use seas_baseline::repo::{MemoryStore, Store};
use seas_baseline::telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let store = connect(&cfg).await?;

    if store.find_site(&cfg.demo.site_id).await?.is_none() {
        warn!(site_id = %cfg.demo.site_id, "site not found, creating it");
        store
            .insert_site(&Site {
                entity_id: cfg.demo.site_id.clone(),
                object_id: None,
                description: cfg.demo.site_description.clone(),
            })
            .await?;
    }

    let (site, meter, model) = setup_demo_sample_models(store.as_ref(), &cfg.demo_options())
        .await
        .context("demo setup failed")?;
    info!(
        site = %site.entity_id,
        meter = %meter.meter_id,
        model_id = model.id,
        model_class = %model.model_class,
        "demo sample models ready"
    );

    if cfg.demo.calc_savings {
        let productions = store.meter_productions(&meter.meter_id).await?;
        let total: f64 = productions.iter().map(|p| p.net_value).sum();
        info!(rows = productions.len(), total_savings = total, "meter productions");
    }

    Ok(())
}

async fn connect(cfg: &Config) -> Result<Box<dyn Store>> {
    #[cfg(feature = "db")]
    {
        if let Some(url) = &cfg.db.url {
            let store = seas_baseline::repo::PgStore::connect(url, cfg.db.max_connections).await?;
            store.migrate().await?;
            return Ok(Box::new(store));
        }
    }

    #[cfg(not(feature = "db"))]
    {
        if cfg.db.url.is_some() {
            warn!("database url set but built without the db feature");
        }
    }

    info!("using in-memory store");
    Ok(Box::new(MemoryStore::new()))
}
