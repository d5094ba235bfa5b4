use chrono::{DateTime, Duration, Utc};
use movie_info::normalize::parse_runtime_minutes;
use movie_info::{MovieDetail, MovieKind, RatingSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[cfg(feature = "graphql")]
use async_graphql::{ComplexObject, SimpleObject};

/// Every fetch or refresh keeps a record fresh for exactly this long.
pub const CACHE_TTL_HOURS: i64 = 24;

pub fn cache_ttl() -> Duration {
    Duration::hours(CACHE_TTL_HOURS)
}

/// A cached movie document.
///
/// `cache_expires_at` is always `last_fetched_at + 24h`; every mutation goes
/// through [`MovieRecord::refresh`] or a constructor to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[cfg_attr(feature = "graphql", graphql(complex))]
pub struct MovieRecord {
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub released_date: Option<String>,
    pub runtime_text: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Vec<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub rating_value: Option<f64>,
    pub rating_text: Option<String>,
    pub metascore: Option<u32>,
    pub external_votes: Option<String>,
    pub external_ratings_breakdown: Vec<RatingSource>,
    pub poster_url: Option<String>,
    pub kind: MovieKind,
    pub search_terms: BTreeSet<String>,
    pub last_fetched_at: DateTime<Utc>,
    pub cache_expires_at: DateTime<Utc>,
    pub total_search_count: u32,
    pub last_searched_at: DateTime<Utc>,
}

impl MovieRecord {
    /// A brand new record for a freshly fetched detail.
    pub fn from_detail(detail: MovieDetail, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            external_id: detail.external_id,
            title: detail.title,
            year: detail.year,
            released_date: detail.released,
            runtime_text: detail.runtime,
            runtime_minutes: detail.runtime_minutes,
            genres: detail.genres,
            director: detail.director,
            writer: detail.writer,
            actors: detail.actors,
            plot: detail.plot,
            language: detail.language,
            country: detail.country,
            rating_value: detail.rating,
            rating_text: detail.rating_text,
            metascore: detail.metascore,
            external_votes: detail.votes,
            external_ratings_breakdown: detail.ratings,
            poster_url: detail.poster_url,
            kind: detail.kind,
            search_terms: BTreeSet::new(),
            last_fetched_at: now,
            cache_expires_at: now + cache_ttl(),
            total_search_count: 1,
            last_searched_at: now,
        };
        record.ensure_runtime_minutes();
        record
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.cache_expires_at
    }

    /// Marks the record as fetched and searched at `now`.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.last_fetched_at = now;
        self.cache_expires_at = now + cache_ttl();
        self.total_search_count = self.total_search_count.saturating_add(1);
        self.last_searched_at = now;
    }

    /// Returns true if the term was not known yet.
    pub fn add_search_term(&mut self, term: &str) -> bool {
        self.search_terms.insert(normalize_term(term))
    }

    /// Replaces every provider field, keeping search terms and counters, then refreshes.
    pub fn overwrite_with(&mut self, detail: MovieDetail, now: DateTime<Utc>) {
        let search_terms = std::mem::take(&mut self.search_terms);
        let total_search_count = self.total_search_count;

        *self = Self::from_detail(detail, now);
        self.search_terms = search_terms;
        self.total_search_count = total_search_count;
        self.refresh(now);
    }

    /// Derives `runtime_minutes` from the runtime text when it is missing.
    pub fn ensure_runtime_minutes(&mut self) {
        if self.runtime_minutes.is_none() {
            self.runtime_minutes = self.runtime_text.as_deref().and_then(parse_runtime_minutes);
        }
    }

    /// "2h 32m", "45m", the raw runtime text, or "N/A".
    pub fn formatted_runtime(&self) -> String {
        match self.runtime_minutes {
            Some(minutes) if minutes > 0 => {
                let (hours, minutes) = (minutes / 60, minutes % 60);
                if hours > 0 {
                    format!("{}h {}m", hours, minutes)
                } else {
                    format!("{}m", minutes)
                }
            }
            _ => self
                .runtime_text
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }

    /// Record state after a search for `term` fetched `detail`.
    ///
    /// A fresh existing record learns the term and is refreshed; its provider
    /// fields stay as they are. A stale or missing record is replaced by a new
    /// one seeded with this single term.
    pub fn merge_search(
        existing: Option<MovieRecord>,
        detail: MovieDetail,
        term: &str,
        now: DateTime<Utc>,
    ) -> MovieRecord {
        match existing {
            Some(mut record) if record.is_fresh(now) => {
                record.add_search_term(term);
                record.refresh(now);
                record.ensure_runtime_minutes();
                record
            }
            _ => {
                let mut record = MovieRecord::from_detail(detail, now);
                record.add_search_term(term);
                record
            }
        }
    }

    /// Record state after a detail fetch by id: overwrite or insert.
    pub fn merge_detail(
        existing: Option<MovieRecord>,
        detail: MovieDetail,
        now: DateTime<Utc>,
    ) -> MovieRecord {
        match existing {
            Some(mut record) => {
                record.overwrite_with(detail, now);
                record
            }
            None => MovieRecord::from_detail(detail, now),
        }
    }
}

#[cfg(feature = "graphql")]
#[ComplexObject]
impl MovieRecord {
    #[graphql(name = "formattedRuntime")]
    async fn formatted_runtime_field(&self) -> String {
        self.formatted_runtime()
    }
}

/// Case-insensitive substring match of any wanted genre against any of `genres`.
pub fn matches_any_genre(genres: &[String], wanted: &[String]) -> bool {
    genres.iter().any(|genre| {
        let genre = genre.to_lowercase();
        wanted.iter().any(|w| genre.contains(&w.to_lowercase()))
    })
}

pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn detail(
        id: &str,
        title: &str,
        rating: Option<f64>,
        genres: &[&str],
    ) -> MovieDetail {
        MovieDetail {
            year: Some(2008),
            runtime: Some("152 min".to_string()),
            rating,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..MovieDetail::new(id, title)
        }
    }

    #[test]
    fn test_ttl_is_fixed_width() {
        let now = Utc::now();
        let mut record = MovieRecord::from_detail(detail("tt1", "A", Some(7.0), &[]), now);
        assert_eq!(record.cache_expires_at - record.last_fetched_at, cache_ttl());

        let later = now + Duration::hours(5);
        record.refresh(later);
        record.refresh(later + Duration::minutes(1));
        assert_eq!(record.cache_expires_at - record.last_fetched_at, cache_ttl());
        assert_eq!(record.total_search_count, 3);
    }

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        let record = MovieRecord::from_detail(detail("tt1", "A", None, &[]), now);
        assert!(record.is_fresh(now));
        assert!(!record.is_fresh(record.cache_expires_at));
    }

    #[test]
    fn test_runtime_minutes_derived_once() {
        let now = Utc::now();
        let mut d = detail("tt1", "A", None, &[]);
        d.runtime_minutes = None;
        let mut record = MovieRecord::from_detail(d, now);
        assert_eq!(record.runtime_minutes, Some(152));

        record.runtime_text = Some("90 min".to_string());
        record.ensure_runtime_minutes();
        assert_eq!(record.runtime_minutes, Some(152));
    }

    #[test]
    fn test_formatted_runtime() {
        let now = Utc::now();
        let mut record = MovieRecord::from_detail(detail("tt1", "A", None, &[]), now);
        assert_eq!(record.formatted_runtime(), "2h 32m");
        record.runtime_minutes = Some(45);
        assert_eq!(record.formatted_runtime(), "45m");
        record.runtime_minutes = None;
        record.runtime_text = None;
        assert_eq!(record.formatted_runtime(), "N/A");
    }

    #[test]
    fn test_genre_match_is_case_insensitive_substring() {
        let genres = vec!["Science Fiction".to_string(), "Drama".to_string()];
        assert!(matches_any_genre(&genres, &["fiction".to_string()]));
        assert!(matches_any_genre(
            &genres,
            &["comedy".to_string(), "DRAMA".to_string()]
        ));
        assert!(!matches_any_genre(&genres, &["horror".to_string()]));
        assert!(!matches_any_genre(&[], &["drama".to_string()]));
    }

    #[test]
    fn test_merge_search_unions_terms_on_fresh_record() {
        let now = Utc::now();
        let first = MovieRecord::merge_search(
            None,
            detail("tt1", "A", Some(8.0), &[]),
            "Batman",
            now,
        );
        assert_eq!(first.total_search_count, 1);

        let second = MovieRecord::merge_search(
            Some(first),
            detail("tt1", "A", Some(8.0), &[]),
            "dark knight",
            now + Duration::hours(1),
        );
        assert_eq!(second.total_search_count, 2);
        assert!(second.search_terms.contains("batman"));
        assert!(second.search_terms.contains("dark knight"));
    }

    #[test]
    fn test_merge_search_replaces_stale_record() {
        let now = Utc::now();
        let mut stale = MovieRecord::from_detail(
            detail("tt1", "Old", Some(8.0), &[]),
            now - Duration::days(3),
        );
        stale.add_search_term("old term");
        stale.total_search_count = 9;

        let merged = MovieRecord::merge_search(
            Some(stale),
            detail("tt1", "New", Some(8.0), &[]),
            "batman",
            now,
        );
        assert_eq!(merged.title, "New");
        assert_eq!(merged.total_search_count, 1);
        assert_eq!(merged.search_terms.len(), 1);
        assert!(merged.is_fresh(now));
    }

    #[test]
    fn test_merge_detail_keeps_terms_and_counts() {
        let now = Utc::now();
        let mut stale = MovieRecord::from_detail(
            detail("tt1", "Old", Some(8.0), &[]),
            now - Duration::days(3),
        );
        stale.add_search_term("batman");
        stale.total_search_count = 4;

        let merged = MovieRecord::merge_detail(
            Some(stale),
            detail("tt1", "New", Some(8.5), &[]),
            now,
        );
        assert_eq!(merged.title, "New");
        assert_eq!(merged.rating_value, Some(8.5));
        assert_eq!(merged.total_search_count, 5);
        assert!(merged.search_terms.contains("batman"));
        assert_eq!(merged.cache_expires_at - merged.last_fetched_at, cache_ttl());
    }
}
