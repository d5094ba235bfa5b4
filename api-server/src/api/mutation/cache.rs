use super::super::{get_context, require_admin};
use async_graphql::{Context, ErrorExtensions, Object, Result};
use log::info;
use movie_cache::{CachedSearch, MovieRecord, OptimizeReport};

#[derive(Default)]
pub struct CacheMutation;

#[Object]
impl CacheMutation {
    /// Refetch a search term from the provider, bypassing the cache. Admin only.
    async fn refresh_cache<'ctx>(
        &self,
        context: &Context<'ctx>,
        term: String,
    ) -> Result<CachedSearch> {
        let caller = require_admin(context)?;
        let ctx = get_context(context);
        ctx.catalog()
            .refresh_search(&term, caller)
            .await
            .map_err(|e| e.extend())
    }

    /// Delete expired records. Returns how many were removed. Admin only.
    async fn cleanup_cache<'ctx>(&self, context: &Context<'ctx>) -> Result<u32> {
        let caller = require_admin(context)?;
        let ctx = get_context(context);
        let removed = ctx
            .cache_manager()
            .sweep_expired()
            .await
            .map_err(|e| e.extend())?;
        info!("{} cleaned up {} expired movies", caller.subject, removed);
        Ok(removed as u32)
    }

    /// Delete expired records, then records nobody searched for in 30 days. Admin only.
    async fn optimize_cache<'ctx>(&self, context: &Context<'ctx>) -> Result<OptimizeReport> {
        require_admin(context)?;
        let ctx = get_context(context);
        ctx.cache_manager().optimize().await.map_err(|e| e.extend())
    }

    async fn delete_movie<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<MovieRecord> {
        let caller = require_admin(context)?;
        let ctx = get_context(context);
        ctx.catalog()
            .delete_movie(&id, caller)
            .await
            .map_err(|e| e.extend())
    }

    /// Warm the cache for `terms`, or for the built-in popular terms when none are given.
    /// Returns how many terms were loaded. Admin only.
    async fn preload_cache<'ctx>(
        &self,
        context: &Context<'ctx>,
        terms: Option<Vec<String>>,
    ) -> Result<u32> {
        let caller = require_admin(context)?;
        let manager = get_context(context).cache_manager();
        let loaded = match terms {
            Some(terms) => manager.preload_terms(&terms[..]).await,
            None => manager.preload_popular().await,
        };
        info!("{} preloaded {} search terms", caller.subject, loaded);
        Ok(loaded as u32)
    }
}
