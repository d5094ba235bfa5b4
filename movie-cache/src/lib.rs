pub mod analytics;
mod catalog;
mod error;
pub mod favorites;
mod identity;
pub mod lifecycle;
pub mod query;
mod record;
pub mod store;


pub use analytics::Analytics;
pub use catalog::{
    CacheSearchOptions, CacheStatus, CachedMovie, CachedSearch, MovieCatalog, RecentMovies,
    SearchRequest, SearchResponse, Source, BATCH_SIZE, DEFAULT_PAGE_LIMIT, RECENT_LIMIT, STAGGER,
};
pub use error::CatalogError;
pub use favorites::{FavoriteError, FavoriteList, FavoriteRegistry};
pub use identity::{Caller, Role};
pub use lifecycle::{
    CacheManager, CacheStatistics, HealthReport, HealthStatus, LifecycleConfig, LifecycleState,
    OptimizeReport,
};
pub use query::{Pagination, SearchFilters, SortOrder};
pub use record::{cache_ttl, normalize_term, MovieRecord, CACHE_TTL_HOURS};
pub use store::{MemoryStore, RecordStore, SqliteStore, StoreError};
