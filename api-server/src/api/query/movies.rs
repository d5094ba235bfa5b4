use super::super::{get_caller, get_context};
use async_graphql::{Context, ErrorExtensions, Object, Result};
use movie_cache::{
    CacheStatus, CachedMovie, RecentMovies, SearchRequest, SearchResponse, SortOrder,
    DEFAULT_PAGE_LIMIT, RECENT_LIMIT,
};

#[derive(Default)]
pub struct MoviesQuery;

#[Object]
impl MoviesQuery {
    /// Search movies by title, or browse the cache when no term is given.
    ///
    /// Filters are `genre:<name>`, `year:<n>` or `rating:>=<x>`.
    async fn search<'ctx>(
        &self,
        context: &Context<'ctx>,
        term: Option<String>,
        sort: Option<SortOrder>,
        filters: Option<Vec<String>>,
        page: Option<u32>,
        limit: Option<u32>,
        force_refresh: Option<bool>,
    ) -> Result<SearchResponse> {
        let ctx = get_context(context);
        let request = SearchRequest {
            term,
            sort: sort.unwrap_or_default(),
            filters: filters.unwrap_or_default(),
            page: page.unwrap_or(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            force_refresh: force_refresh.unwrap_or(false),
        };

        ctx.catalog()
            .search(request, get_caller(context))
            .await
            .map_err(|e| e.extend())
    }

    async fn movie<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<CachedMovie> {
        let ctx = get_context(context);
        ctx.catalog()
            .get_by_id(&id, get_caller(context))
            .await
            .map_err(|e| e.extend())
    }

    /// Whether a term can be answered from the cache.
    async fn cache_status<'ctx>(
        &self,
        context: &Context<'ctx>,
        term: String,
    ) -> Result<CacheStatus> {
        let ctx = get_context(context);
        ctx.catalog().cache_status(&term).await.map_err(|e| e.extend())
    }

    async fn recent_movies<'ctx>(
        &self,
        context: &Context<'ctx>,
        limit: Option<u32>,
    ) -> Result<RecentMovies> {
        let ctx = get_context(context);
        let limit = limit.map(|l| l as usize).unwrap_or(RECENT_LIMIT);
        ctx.catalog().recent(limit).await.map_err(|e| e.extend())
    }
}
