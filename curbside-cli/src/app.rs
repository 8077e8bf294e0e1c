use std::sync::Arc;

use anyhow::{Context, Result};
use curbside_core::{
    memory::MemoryScheduleStore,
    model::{CityId, CityMeta},
    notify::{Notifier, ResendTransport},
    plugin::{CityPlugin, PluginRegistry},
    ports::ScheduleStore,
    postal::GeoNamesTable,
    region::RegionResolver,
    retry::RetryPolicy,
    rules::BaselineStore,
    service::CurbsideService,
};
use curbside_provider_recology as recology;
use curbside_provider_san_jose as san_jose;
use curbside_store_sqlite::SqliteScheduleStore;
use reqwest::Client;

use crate::config::Config;

const API_KEY_ENV: &str = "RESEND_API_KEY";

/// Every provider the binary ships with.
pub(crate) fn plugins(config: &Config) -> Vec<CityPlugin> {
    let mut plugins = vec![san_jose::plugin(config.scraper.to_scraper_config())];
    plugins.extend(recology::plugins());
    plugins
}

/// Registered cities, or just the one whose id is `id`.
pub(crate) fn select_cities(registry: &PluginRegistry, id: Option<&str>) -> Result<Vec<CityMeta>> {
    let Some(id) = id else {
        return Ok(registry.cities());
    };
    let plugin = registry
        .plugin(&CityId(id.trim().to_owned()))
        .with_context(|| format!("no provider for city id {id:?}"))?;
    Ok(vec![plugin.meta.clone()])
}

/// Assemble the service from configuration.
///
/// With `persist_cache` off, lookups are cached in memory for this run only.
pub(crate) async fn build_service(config: &Config, persist_cache: bool) -> Result<CurbsideService> {
    let table = GeoNamesTable::load(&config.data.postal_table)
        .with_context(|| format!("loading postal table {}", config.data.postal_table.display()))?;

    let store: Arc<dyn ScheduleStore> = if persist_cache {
        Arc::new(
            SqliteScheduleStore::connect(&config.cache.database_path)
                .await
                .context("opening schedule cache")?,
        )
    } else {
        Arc::new(MemoryScheduleStore::new())
    };

    Ok(CurbsideService::new(
        Arc::new(PluginRegistry::new(plugins(config))),
        RegionResolver::new(Arc::new(table)),
        store,
        Arc::new(BaselineStore::new(config.data.baseline_dir.clone())),
    ))
}

/// Build the email notifier, taking the API key from config or `RESEND_API_KEY`.
pub(crate) fn build_notifier(config: &Config) -> Result<Notifier> {
    let api_key = config
        .mail
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
        .with_context(|| format!("no mail API key: set [mail] api_key or {API_KEY_ENV}"))?;

    let client = Client::builder().user_agent("curbside/0.1").build()?;
    let transport = ResendTransport::new(client, api_key, config.mail.from.clone());
    Ok(Notifier::new(Arc::new(transport), RetryPolicy::default()))
}
