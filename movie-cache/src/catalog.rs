use crate::analytics::{popular_search_terms, TermCount};
use crate::error::CatalogError;
use crate::favorites::{is_valid_external_id, FavoriteList};
use crate::identity::Caller;
use crate::query::{Pagination, RecordQuery, SearchFilters, SortOrder};
use crate::record::{matches_any_genre, normalize_term, MovieRecord};
use crate::store::RecordStore;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use movie_info::{MovieDetail, MovieProvider, SearchItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Detail fetches running concurrently per batch.
pub const BATCH_SIZE: usize = 5;
/// Delay added per position inside a batch before its detail fetch starts.
pub const STAGGER: Duration = Duration::from_millis(200);
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const RECENT_LIMIT: usize = 12;
const RECENT_POPULAR_TERMS: usize = 5;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

#[derive(Debug, Clone, Default)]
pub struct CacheSearchOptions {
    pub force_refresh: bool,
    pub filters: SearchFilters,
    /// Provider result page, 1 when unset.
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CachedSearch {
    pub items: Vec<MovieRecord>,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CachedMovie {
    pub item: MovieRecord,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Empty or missing means browse the cache.
    pub term: Option<String>,
    pub sort: SortOrder,
    /// `field:value` filter strings.
    pub filters: Vec<String>,
    pub page: u32,
    pub limit: u32,
    pub force_refresh: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            term: None,
            sort: SortOrder::default(),
            filters: vec![],
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct SearchResponse {
    pub items: Vec<MovieRecord>,
    pub total_count: u32,
    pub source: Source,
    pub applied_filters: SearchFilters,
    /// Only set when browsing the cache.
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CacheStatus {
    pub term: String,
    pub cached_count: u32,
    pub needs_api_fetch: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct RecentMovies {
    pub movies: Vec<MovieRecord>,
    pub popular_terms: Vec<TermCount>,
}

/// Why a candidate did not make it into a fetch result.
enum CandidateDropped {
    DetailFetchFailed(movie_info::Error),
    GenreMismatch,
    BelowMinRating,
}

impl fmt::Display for CandidateDropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateDropped::DetailFetchFailed(error) => {
                write!(f, "detail fetch failed: {}", error)
            }
            CandidateDropped::GenreMismatch => write!(f, "no requested genre"),
            CandidateDropped::BelowMinRating => write!(f, "rating below minimum"),
        }
    }
}

fn screen_candidate(
    fetched: Result<MovieDetail, movie_info::Error>,
    filters: &SearchFilters,
) -> Result<MovieDetail, CandidateDropped> {
    let detail = fetched.map_err(CandidateDropped::DetailFetchFailed)?;

    if !filters.genres.is_empty() && !matches_any_genre(&detail.genres, &filters.genres) {
        return Err(CandidateDropped::GenreMismatch);
    }
    if let Some(min_rating) = filters.min_rating {
        if !detail.rating.is_some_and(|rating| rating >= min_rating) {
            return Err(CandidateDropped::BelowMinRating);
        }
    }

    Ok(detail)
}

/// Cache-first access to movie data.
#[derive(Clone)]
pub struct MovieCatalog {
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn MovieProvider>,
}

impl MovieCatalog {
    pub fn new(store: Arc<dyn RecordStore>, provider: Arc<dyn MovieProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Serves `term` from fresh cached records, or fetches and caches it.
    ///
    /// Fetched results are in completion order, which is not stable across calls.
    pub async fn search_and_cache(
        &self,
        term: &str,
        options: &CacheSearchOptions,
    ) -> Result<CachedSearch, CatalogError> {
        let term = normalize_term(term);
        let filters = &options.filters;

        if !options.force_refresh {
            let query = RecordQuery::for_term(&term).with_filters(filters);
            let mut cached = self.store.find_fresh(&query, Utc::now()).await?;
            if !cached.is_empty() {
                log::debug!("Cache hit for '{}': {} movies", term, cached.len());
                SortOrder::Rating.sort(&mut cached);
                return Ok(CachedSearch {
                    items: cached,
                    source: Source::Cache,
                });
            }
            log::debug!("Cache miss for '{}'", term);
        }

        let page = self
            .provider
            .search_by_title(&term, options.page.max(1), filters.year)
            .await?;
        if page.is_empty() {
            return Err(CatalogError::NoResultsFound(term));
        }

        let candidates = page.items.len();
        let mut items = vec![];
        for batch in page.items.chunks(BATCH_SIZE) {
            items.extend(self.fetch_batch(batch, &term, filters).await?);
        }

        log::info!(
            "Fetched '{}' from provider: {} of {} candidates cached",
            term,
            items.len(),
            candidates
        );
        Ok(CachedSearch {
            items,
            source: Source::Api,
        })
    }

    async fn fetch_batch(
        &self,
        batch: &[SearchItem],
        term: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<MovieRecord>, CatalogError> {
        let provider = &self.provider;
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .enumerate()
            .map(|(position, item)| async move {
                tokio::time::sleep(STAGGER * position as u32).await;
                let fetched = provider.fetch_detail(&item.external_id).await;
                (item.external_id.as_str(), fetched)
            })
            .collect();

        let mut persisted = Vec::with_capacity(batch.len());
        while let Some((external_id, fetched)) = pending.next().await {
            match screen_candidate(fetched, filters) {
                Ok(detail) => {
                    let record = self.store.upsert_searched(detail, term, Utc::now()).await?;
                    persisted.push(record);
                }
                Err(reason) => log::debug!("Dropped candidate {}: {}", external_id, reason),
            }
        }
        Ok(persisted)
    }

    /// A single movie, cached or fetched. A failed fetch creates nothing.
    pub async fn get_detail_with_cache(
        &self,
        external_id: &str,
    ) -> Result<CachedMovie, CatalogError> {
        if let Some(item) = self.store.touch_fresh(external_id, Utc::now()).await? {
            log::debug!("Cache hit for movie {}", external_id);
            return Ok(CachedMovie {
                item,
                source: Source::Cache,
            });
        }

        let detail = self.provider.fetch_detail(external_id).await?;
        let item = self.store.upsert_detail(detail, Utc::now()).await?;
        Ok(CachedMovie {
            item,
            source: Source::Api,
        })
    }

    /// Term search through the cache pipeline, or a sorted and paginated browse
    /// of fresh records when no term is given.
    pub async fn search(
        &self,
        request: SearchRequest,
        caller: Option<&Caller>,
    ) -> Result<SearchResponse, CatalogError> {
        let applied_filters = SearchFilters::parse(&request.filters);
        if let Some(caller) = caller {
            log::debug!("Search by {} ({})", caller.subject, caller.role);
        }

        let term = request.term.as_deref().map(str::trim).unwrap_or_default();
        if !term.is_empty() {
            let options = CacheSearchOptions {
                force_refresh: request.force_refresh,
                filters: applied_filters.clone(),
                page: request.page,
            };
            let result = self.search_and_cache(term, &options).await?;
            return Ok(SearchResponse {
                total_count: result.items.len() as u32,
                items: result.items,
                source: result.source,
                applied_filters,
                pagination: None,
            });
        }

        let query = RecordQuery::fresh().with_filters(&applied_filters);
        let mut records = self.store.find_fresh(&query, Utc::now()).await?;
        request.sort.sort(&mut records);

        let pagination = Pagination::new(request.page, request.limit, records.len() as u32);
        Ok(SearchResponse {
            items: pagination.slice(&records),
            total_count: pagination.total,
            source: Source::Cache,
            applied_filters,
            pagination: Some(pagination),
        })
    }

    pub async fn get_by_id(
        &self,
        external_id: &str,
        caller: Option<&Caller>,
    ) -> Result<CachedMovie, CatalogError> {
        if !is_valid_external_id(external_id) {
            return Err(CatalogError::InvalidId(external_id.to_string()));
        }
        if let Some(caller) = caller {
            log::debug!("Movie {} requested by {}", external_id, caller.subject);
        }
        self.get_detail_with_cache(external_id).await
    }

    pub async fn cache_status(&self, term: &str) -> Result<CacheStatus, CatalogError> {
        let term = normalize_term(term);
        let cached = self
            .store
            .find_fresh(&RecordQuery::for_term(&term), Utc::now())
            .await?;
        Ok(CacheStatus {
            term,
            cached_count: cached.len() as u32,
            needs_api_fetch: cached.is_empty(),
        })
    }

    /// Most recently fetched movies that have a poster.
    pub async fn recent(&self, limit: usize) -> Result<RecentMovies, CatalogError> {
        let now = Utc::now();
        let fresh = self.store.find_fresh(&RecordQuery::fresh(), now).await?;
        let popular_terms = popular_search_terms(&fresh, RECENT_POPULAR_TERMS);

        let with_poster = RecordQuery {
            require_poster: true,
            ..RecordQuery::fresh()
        };
        let mut movies = self.store.find_fresh(&with_poster, now).await?;
        movies.sort_by(|a, b| b.last_fetched_at.cmp(&a.last_fetched_at));
        movies.truncate(limit);

        Ok(RecentMovies {
            movies,
            popular_terms,
        })
    }

    pub async fn delete_movie(
        &self,
        external_id: &str,
        caller: &Caller,
    ) -> Result<MovieRecord, CatalogError> {
        if !caller.is_admin() {
            return Err(CatalogError::Forbidden);
        }
        let deleted = self
            .store
            .delete(external_id)
            .await?
            .ok_or_else(|| CatalogError::NoResultsFound(external_id.to_string()))?;
        log::info!("Movie {} deleted by {}", external_id, caller.subject);
        Ok(deleted)
    }

    /// Forced refetch of a term, bypassing the cache.
    pub async fn refresh_search(
        &self,
        term: &str,
        caller: &Caller,
    ) -> Result<CachedSearch, CatalogError> {
        if !caller.is_admin() {
            return Err(CatalogError::Forbidden);
        }
        if term.trim().is_empty() {
            return Err(CatalogError::MissingSearchTerm);
        }
        let options = CacheSearchOptions {
            force_refresh: true,
            ..CacheSearchOptions::default()
        };
        self.search_and_cache(term, &options).await
    }

    /// Fresh cached favorites first, the rest resolved one at a time.
    /// Favorites that cannot be resolved are left out.
    pub async fn resolve_favorites(
        &self,
        favorites: &FavoriteList,
    ) -> Result<Vec<MovieRecord>, CatalogError> {
        let now = Utc::now();
        let mut resolved = Vec::with_capacity(favorites.len());
        let mut missing = vec![];

        for external_id in favorites.ids() {
            match self.store.get(external_id).await? {
                Some(record) if record.is_fresh(now) => resolved.push(record),
                _ => missing.push(external_id),
            }
        }

        for external_id in missing {
            match self.get_detail_with_cache(external_id).await {
                Ok(movie) => resolved.push(movie.item),
                Err(e) => log::warn!("Could not resolve favorite {}: {}", external_id, e),
            }
        }

        Ok(resolved)
    }
}
