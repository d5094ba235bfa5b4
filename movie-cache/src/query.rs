use crate::record::{matches_any_genre, normalize_term, MovieRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum_macros::{Display, EnumString};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Upper bound of a browse page.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Predicate over cached records. Freshness is always implied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Lowercase term the record must have matched before.
    pub search_term: Option<String>,
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    /// At least one must match, case-insensitive.
    pub genres: Vec<String>,
    pub require_poster: bool,
}

impl RecordQuery {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn for_term(term: &str) -> Self {
        Self {
            search_term: Some(normalize_term(term)),
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: &SearchFilters) -> Self {
        self.year = filters.year;
        self.min_rating = filters.min_rating;
        self.genres = filters.genres.clone();
        self
    }

    pub fn matches(&self, record: &MovieRecord, now: DateTime<Utc>) -> bool {
        if !record.is_fresh(now) {
            return false;
        }
        if let Some(term) = &self.search_term {
            if !record.search_terms.contains(term) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if record.year != Some(year) {
                return false;
            }
        }
        if let Some(min_rating) = self.min_rating {
            if !record.rating_value.is_some_and(|r| r >= min_rating) {
                return false;
            }
        }
        if !self.genres.is_empty() && !matches_any_genre(&record.genres, &self.genres) {
            return false;
        }
        if self.require_poster && record.poster_url.is_none() {
            return false;
        }
        true
    }
}

/// Filters applied both to the cache lookup and, during a fetch, to every candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct SearchFilters {
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    pub genres: Vec<String>,
}

impl SearchFilters {
    /// Parses `field:value` filter strings: `genre:Action`, `year:2008`, `rating:>=7.5`.
    ///
    /// Unknown fields and malformed values are ignored.
    pub fn parse<S: AsRef<str>>(filters: &[S]) -> Self {
        let mut parsed = SearchFilters::default();

        for filter in filters {
            let Some((field, value)) = filter.as_ref().split_once(':') else {
                log::debug!("Ignoring malformed filter '{}'", filter.as_ref());
                continue;
            };
            let value = value.trim();
            match field.trim().to_lowercase().as_str() {
                "genre" if !value.is_empty() => parsed.genres.push(value.to_string()),
                "year" => {
                    if let Ok(year) = value.parse() {
                        parsed.year = Some(year);
                    }
                }
                "rating" => {
                    let min = value
                        .strip_prefix(">=")
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .filter(|v| v.is_finite());
                    if let Some(min) = min {
                        parsed.min_rating = Some(min);
                    }
                }
                _ => log::debug!("Ignoring unknown filter '{}'", filter.as_ref()),
            }
        }

        parsed
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.min_rating.is_none() && self.genres.is_empty()
    }
}

/// Ordering of browse results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    /// Rating desc, then year desc.
    #[default]
    Rating,
    /// Year desc, then rating desc.
    Year,
    /// Title ascending.
    Title,
    /// Search count desc, then rating desc.
    Popularity,
}

fn desc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    // Missing values sort last.
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl SortOrder {
    pub fn compare(&self, a: &MovieRecord, b: &MovieRecord) -> Ordering {
        match self {
            SortOrder::Rating => {
                desc(a.rating_value, b.rating_value).then_with(|| desc(a.year, b.year))
            }
            SortOrder::Year => {
                desc(a.year, b.year).then_with(|| desc(a.rating_value, b.rating_value))
            }
            SortOrder::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortOrder::Popularity => b
                .total_search_count
                .cmp(&a.total_search_count)
                .then_with(|| desc(a.rating_value, b.rating_value)),
        }
    }

    pub fn sort(&self, records: &mut [MovieRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    /// Clamps `page` to at least 1 and `limit` to `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: u32, limit: u32, total: u32) -> Self {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let pages = total.div_ceil(limit);
        Self {
            page,
            limit,
            total,
            pages,
            has_next_page: page < pages,
            has_prev_page: page > 1,
        }
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let skip = ((self.page - 1) as usize).saturating_mul(self.limit as usize);
        items
            .iter()
            .skip(skip)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::detail;
    use chrono::Duration;

    #[test]
    fn test_parse_filters() {
        let filters = SearchFilters::parse(&[
            "genre:Action",
            "genre:Drama",
            "year:2008",
            "rating:>=7.5",
            "rating:7",
            "bogus",
            "director:Nolan",
        ]);
        assert_eq!(filters.genres, vec!["Action", "Drama"]);
        assert_eq!(filters.year, Some(2008));
        assert_eq!(filters.min_rating, Some(7.5));
    }

    #[test]
    fn test_parse_no_filters() {
        let filters = SearchFilters::parse::<&str>(&[]);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_parse_ignores_non_finite_rating() {
        for filter in ["rating:>=NaN", "rating:>=inf", "rating:>=-inf"] {
            assert_eq!(SearchFilters::parse(&[filter]).min_rating, None, "{}", filter);
        }
        assert_eq!(SearchFilters::parse(&["rating:>= 8"]).min_rating, Some(8.0));
    }

    #[test]
    fn test_query_require_poster() {
        let now = Utc::now();
        let mut record = MovieRecord::from_detail(detail("tt1", "A", Some(8.0), &[]), now);
        let query = RecordQuery {
            require_poster: true,
            ..RecordQuery::fresh()
        };
        record.poster_url = None;
        assert!(!query.matches(&record, now));
        record.poster_url = Some("https://img/a.jpg".to_string());
        assert!(query.matches(&record, now));
    }

    #[test]
    fn test_query_requires_freshness() {
        let now = Utc::now();
        let mut record = MovieRecord::from_detail(
            detail("tt1", "A", Some(8.0), &[]),
            now - Duration::days(2),
        );
        record.add_search_term("batman");
        assert!(!RecordQuery::for_term("batman").matches(&record, now));
        assert!(RecordQuery::for_term("Batman").matches(&record, now - Duration::days(2)));
    }

    #[test]
    fn test_query_min_rating_excludes_unrated() {
        let now = Utc::now();
        let record = MovieRecord::from_detail(detail("tt1", "A", None, &[]), now);
        let query = RecordQuery {
            min_rating: Some(1.0),
            ..RecordQuery::fresh()
        };
        assert!(!query.matches(&record, now));
    }

    #[test]
    fn test_sort_by_rating_then_year() {
        let now = Utc::now();
        let mut a = MovieRecord::from_detail(detail("tt1", "A", Some(7.0), &[]), now);
        a.year = Some(2001);
        let mut b = MovieRecord::from_detail(detail("tt2", "B", Some(9.0), &[]), now);
        b.year = Some(1999);
        let mut c = MovieRecord::from_detail(detail("tt3", "C", Some(7.0), &[]), now);
        c.year = Some(2010);
        let d = MovieRecord::from_detail(detail("tt4", "D", None, &[]), now);

        let mut records = vec![a, b, c, d];
        SortOrder::Rating.sort(&mut records);
        let ids: Vec<_> = records.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["tt2", "tt3", "tt1", "tt4"]);
    }

    #[test]
    fn test_pagination_clamps() {
        let pagination = Pagination::new(0, 500, 120);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, MAX_PAGE_LIMIT);
        assert_eq!(pagination.pages, 3);
        assert!(pagination.has_next_page);
        assert!(!pagination.has_prev_page);

        let items: Vec<u32> = (0..120).collect();
        let last = Pagination::new(3, 50, 120);
        assert_eq!(last.slice(&items).len(), 20);
        assert!(!last.has_next_page);
    }
}
