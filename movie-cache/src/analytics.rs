//! Aggregations over fresh cached records.

use crate::error::CatalogError;
use crate::query::RecordQuery;
use crate::record::MovieRecord;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

const DASHBOARD_TOP: usize = 10;
const DASHBOARD_RECENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct TermCount {
    pub term: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct MovieSummary {
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub runtime_minutes: Option<u32>,
    pub poster_url: Option<String>,
    pub last_fetched_at: DateTime<Utc>,
}

impl From<&MovieRecord> for MovieSummary {
    fn from(record: &MovieRecord) -> Self {
        Self {
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            year: record.year,
            rating: record.rating_value,
            runtime_minutes: record.runtime_minutes,
            poster_url: record.poster_url.clone(),
            last_fetched_at: record.last_fetched_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct GenreStat {
    pub genre: String,
    pub count: u32,
    /// Over rated members only.
    pub average_rating: Option<f64>,
    pub movies: Vec<MovieSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct RatingStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct RuntimeYear {
    pub year: Option<i32>,
    pub average_runtime: f64,
    pub count: u32,
    pub movies: Vec<MovieSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct DashboardSummary {
    pub total_movies: u32,
    pub total_genres: u32,
    pub avg_rating: f64,
    pub total_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub top_genres: Vec<GenreStat>,
    pub rating_stats: RatingStats,
    pub runtime_by_year: Vec<RuntimeYear>,
    pub recent_movies: Vec<MovieSummary>,
    pub generated_at: DateTime<Utc>,
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// One entry per genre, most common first.
pub fn genre_stats(records: &[MovieRecord]) -> Vec<GenreStat> {
    let mut by_genre: HashMap<&str, Vec<&MovieRecord>> = HashMap::new();
    for record in records {
        for genre in &record.genres {
            by_genre.entry(genre.as_str()).or_default().push(record);
        }
    }

    let mut stats: Vec<_> = by_genre
        .into_iter()
        .map(|(genre, members)| GenreStat {
            genre: genre.to_string(),
            count: members.len() as u32,
            average_rating: average(members.iter().filter_map(|r| r.rating_value)),
            movies: members.into_iter().map(MovieSummary::from).collect(),
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
    stats
}

/// Zeros when nothing is rated.
pub fn rating_stats(records: &[MovieRecord]) -> RatingStats {
    let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating_value).collect();
    let Some(average) = average(ratings.iter().copied()) else {
        return RatingStats::default();
    };
    RatingStats {
        average,
        min: ratings.iter().copied().fold(f64::INFINITY, f64::min),
        max: ratings.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        total: ratings.len() as u32,
    }
}

/// Average runtime per year, latest year first.
pub fn runtime_by_year(records: &[MovieRecord]) -> Vec<RuntimeYear> {
    let mut by_year: BTreeMap<Option<i32>, Vec<&MovieRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.runtime_minutes.is_some_and(|m| m > 0)) {
        by_year.entry(record.year).or_default().push(record);
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, members)| RuntimeYear {
            year,
            average_runtime: average(
                members
                    .iter()
                    .filter_map(|r| r.runtime_minutes.map(f64::from)),
            )
            .unwrap_or_default(),
            count: members.len() as u32,
            movies: members.into_iter().map(MovieSummary::from).collect(),
        })
        .collect()
}

/// The `limit` most frequent search terms.
pub fn popular_search_terms(records: &[MovieRecord], limit: usize) -> Vec<TermCount> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for term in records.iter().flat_map(|r| r.search_terms.iter()) {
        *counts.entry(term.as_str()).or_default() += 1;
    }

    let mut terms: Vec<_> = counts
        .into_iter()
        .map(|(term, count)| TermCount {
            term: term.to_string(),
            count,
        })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(limit);
    terms
}

pub fn dashboard(records: &[MovieRecord], now: DateTime<Utc>) -> Dashboard {
    let genres = genre_stats(records);
    let ratings = rating_stats(records);
    let runtimes = runtime_by_year(records);

    let mut recent: Vec<&MovieRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.last_fetched_at.cmp(&a.last_fetched_at));

    Dashboard {
        summary: DashboardSummary {
            total_movies: records.len() as u32,
            total_genres: genres.len() as u32,
            avg_rating: ratings.average,
            total_years: runtimes.len() as u32,
        },
        top_genres: genres.into_iter().take(DASHBOARD_TOP).collect(),
        rating_stats: ratings,
        runtime_by_year: runtimes.into_iter().take(DASHBOARD_TOP).collect(),
        recent_movies: recent
            .into_iter()
            .take(DASHBOARD_RECENT)
            .map(MovieSummary::from)
            .collect(),
        generated_at: now,
    }
}

/// Store-backed entry points for the aggregations above.
#[derive(Clone)]
pub struct Analytics {
    store: Arc<dyn RecordStore>,
}

impl Analytics {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn fresh(&self) -> Result<Vec<MovieRecord>, CatalogError> {
        Ok(self.store.find_fresh(&RecordQuery::fresh(), Utc::now()).await?)
    }

    pub async fn genre_stats(&self) -> Result<Vec<GenreStat>, CatalogError> {
        Ok(genre_stats(&self.fresh().await?))
    }

    pub async fn rating_stats(&self) -> Result<RatingStats, CatalogError> {
        Ok(rating_stats(&self.fresh().await?))
    }

    pub async fn runtime_by_year(&self) -> Result<Vec<RuntimeYear>, CatalogError> {
        Ok(runtime_by_year(&self.fresh().await?))
    }

    pub async fn dashboard(&self) -> Result<Dashboard, CatalogError> {
        Ok(dashboard(&self.fresh().await?, Utc::now()))
    }

    pub async fn popular_search_terms(&self, limit: usize) -> Result<Vec<TermCount>, CatalogError> {
        Ok(popular_search_terms(&self.fresh().await?, limit))
    }
}
