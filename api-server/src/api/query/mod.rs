mod analytics;
mod cache_stats;
mod favorites;
mod movies;

use analytics::AnalyticsQuery;
use async_graphql::MergedObject;
use cache_stats::CacheStatsQuery;
use favorites::FavoritesQuery;
use movies::MoviesQuery;

#[derive(MergedObject, Default)]
pub struct Query(MoviesQuery, AnalyticsQuery, CacheStatsQuery, FavoritesQuery);
