use getset::Getters;
use log::info;
use movie_cache::{Analytics, CacheManager, FavoriteRegistry, MovieCatalog};
use std::sync::Arc;

use super::config::Config;

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    catalog: MovieCatalog,
    cache_manager: CacheManager,
    analytics: Analytics,
    favorites: FavoriteRegistry,
    config: Config,
}

impl Context {
    pub fn new(catalog: MovieCatalog, cache_manager: CacheManager, config: Config) -> Self {
        info!(
            "Serving movies from the {} store, schedules owned: {}",
            config.store.backend, config.lifecycle.owns_schedules
        );

        Self {
            analytics: Analytics::new(catalog.store().clone()),
            catalog,
            cache_manager,
            favorites: FavoriteRegistry::new(),
            config,
        }
    }
}

pub type ContextPointer = Arc<Context>;
