mod api;
mod models;

use log::{info, warn, LevelFilter};
use models::config::{Config, StoreBackend};
use models::context::Context;
use models::error::ServerError;
use movie_cache::{
    CacheManager, LifecycleConfig, MemoryStore, MovieCatalog, RecordStore, SqliteStore,
};
use movie_info::MovieInfoClient;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn setup_logging(config: &Config) -> Result<(), ServerError> {
    let level = LevelFilter::from_str(&config.log.level).unwrap_or(LevelFilter::Info);
    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("rocket")
        .add_filter_ignore_str("_")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &config.log.file {
        loggers.push(WriteLogger::new(level, log_config, File::create(path)?));
    }

    CombinedLogger::init(loggers).map_err(|e| ServerError::Logging(e.to_string()))
}

fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, ServerError> {
    Ok(match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => {
            info!("Opening movie store at {}", config.store.path.display());
            Arc::new(SqliteStore::open(&config.store.path)?)
        }
    })
}

#[rocket::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::load()?;
    setup_logging(&config)?;

    if config.omdb.api_key.is_empty() {
        warn!("No OMDb API key configured, provider requests will fail");
    }
    let provider = MovieInfoClient::with_base_url(
        config.omdb.api_key.clone(),
        &config.omdb.base_url,
    )?;
    let store = open_store(&config)?;

    let catalog = MovieCatalog::new(store, Arc::new(provider));
    let cache_manager = CacheManager::new(
        catalog.clone(),
        LifecycleConfig {
            owns_schedules: config.lifecycle.owns_schedules,
            initial_sweep_delay: Duration::from_secs(config.lifecycle.initial_sweep_delay_secs),
        },
    )?;
    cache_manager.start().await;

    let context = Arc::new(Context::new(catalog, cache_manager.clone(), config));
    let schema = api::build_schema(context);

    let result = rocket::build()
        .manage(schema)
        .mount("/", api::routes())
        .launch()
        .await;

    cache_manager.stop().await;
    result?;
    Ok(())
}
