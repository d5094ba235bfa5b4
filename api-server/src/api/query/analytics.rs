use super::super::get_context;
use async_graphql::{Context, ErrorExtensions, Object, Result};
use movie_cache::analytics::{Dashboard, GenreStat, RatingStats, RuntimeYear, TermCount};

const DEFAULT_POPULAR_TERMS: u32 = 10;

#[derive(Default)]
pub struct AnalyticsQuery;

#[Object]
impl AnalyticsQuery {
    async fn genre_analytics<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<GenreStat>> {
        let ctx = get_context(context);
        ctx.analytics().genre_stats().await.map_err(|e| e.extend())
    }

    async fn rating_analytics<'ctx>(&self, context: &Context<'ctx>) -> Result<RatingStats> {
        let ctx = get_context(context);
        ctx.analytics().rating_stats().await.map_err(|e| e.extend())
    }

    async fn runtime_analytics<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<RuntimeYear>> {
        let ctx = get_context(context);
        ctx.analytics().runtime_by_year().await.map_err(|e| e.extend())
    }

    async fn dashboard<'ctx>(&self, context: &Context<'ctx>) -> Result<Dashboard> {
        let ctx = get_context(context);
        ctx.analytics().dashboard().await.map_err(|e| e.extend())
    }

    /// Search terms shared by the most fresh movies, most common first.
    async fn popular_search_terms<'ctx>(
        &self,
        context: &Context<'ctx>,
        limit: Option<u32>,
    ) -> Result<Vec<TermCount>> {
        let limit = limit.unwrap_or(DEFAULT_POPULAR_TERMS) as usize;
        get_context(context)
            .analytics()
            .popular_search_terms(limit)
            .await
            .map_err(|e| e.extend())
    }
}
