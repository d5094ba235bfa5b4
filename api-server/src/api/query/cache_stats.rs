use super::super::{get_context, require_admin};
use async_graphql::{Context, ErrorExtensions, Object, Result};
use movie_cache::{CacheStatistics, HealthReport};

#[derive(Default)]
pub struct CacheStatsQuery;

#[Object]
impl CacheStatsQuery {
    /// Current cache statistics. Admin only.
    async fn cache_stats<'ctx>(&self, context: &Context<'ctx>) -> Result<CacheStatistics> {
        require_admin(context)?;
        let ctx = get_context(context);
        ctx.cache_manager()
            .compute_statistics()
            .await
            .map_err(|e| e.extend())
    }

    /// Health grade of the cache with issues and recommendations. Admin only.
    async fn cache_health<'ctx>(&self, context: &Context<'ctx>) -> Result<HealthReport> {
        require_admin(context)?;
        let ctx = get_context(context);
        ctx.cache_manager().health_report().await.map_err(|e| e.extend())
    }
}
