mod error;
mod models;
pub mod normalize;
mod omdb;
mod provider;

pub use error::Error;
pub use models::{MovieDetail, MovieKind, RatingSource, SearchItem, SearchPage};
pub use provider::MovieProvider;

use ::utils::surf_logging::SurfLogging;
use async_trait::async_trait;
use getset::Getters;
use omdb::{DetailParams, Envelope, OmdbMovie, OmdbSearch, SearchParams};
use serde::de::DeserializeOwned;
use std::time::Duration;
use surf::{Client, Config, Url};

pub const DEFAULT_BASE_URL: &str = "http://www.omdbapi.com/";

/// Every provider call gives up after this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider error messages that mean "the search simply matched nothing".
const NO_RESULT_MESSAGES: &[&str] = &["not found", "too many results"];

/// Client for the OMDb metadata API.
#[derive(Clone, Getters)]
pub struct MovieInfoClient {
    http: Client,
    #[get = "pub"]
    base_url: Url,
    api_key: String,
}

impl MovieInfoClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config(e.to_string()))?;
        let http: Client = Config::new()
            .set_timeout(Some(REQUEST_TIMEOUT))
            .try_into()
            .map_err(|e| Error::Config(format!("{}", e)))?;

        Ok(Self {
            http: http.with(SurfLogging),
            base_url,
            api_key: api_key.into(),
        })
    }

    async fn get<Q, T>(&self, params: &Q) -> Result<T, Error>
    where
        Q: serde::Serialize,
        T: DeserializeOwned,
    {
        let mut response = self
            .http
            .get(self.base_url.clone())
            .query(params)
            .map_err(|e| Error::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let body = response
            .body_string()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))
    }
}

fn is_no_result_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NO_RESULT_MESSAGES.iter().any(|m| message.contains(m))
}

fn failure_message(envelope: &Envelope) -> String {
    envelope
        .error
        .clone()
        .unwrap_or_else(|| "unknown provider error".to_string())
}

/// Reads a search response. "Nothing matched" failures become an empty page.
fn read_search(search: OmdbSearch, term: &str, page: u32) -> Result<SearchPage, Error> {
    if !search.envelope.is_success() {
        let message = failure_message(&search.envelope);
        if is_no_result_message(&message) {
            log::debug!("No results for '{}': {}", term, message);
            return Ok(SearchPage::empty(page, Some(message)));
        }
        log::warn!("Search for '{}' rejected by provider: {}", term, message);
        return Err(Error::Provider(message));
    }

    let total_count = search
        .total_results
        .as_deref()
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0);
    let items: Vec<SearchItem> = search
        .search
        .into_iter()
        .map(normalize::search_item)
        .collect();

    log::debug!(
        "Search for '{}' page {} returned {} of {} results",
        term,
        page,
        items.len(),
        total_count
    );

    Ok(SearchPage {
        items,
        total_count,
        page,
        message: None,
    })
}

/// Reads a detail response. An unknown or malformed id is `NotFound`.
fn read_detail(movie: OmdbMovie, external_id: &str) -> Result<MovieDetail, Error> {
    if !movie.envelope.is_success() {
        let message = failure_message(&movie.envelope);
        return Err(
            if is_no_result_message(&message) || message.contains("IMDb ID") {
                Error::NotFound(message)
            } else {
                Error::Provider(message)
            },
        );
    }

    Ok(normalize::movie_detail(movie, external_id))
}

#[async_trait]
impl MovieProvider for MovieInfoClient {
    async fn search_by_title(
        &self,
        term: &str,
        page: u32,
        year: Option<i32>,
    ) -> Result<SearchPage, Error> {
        let page = page.max(1);
        let params = SearchParams {
            apikey: &self.api_key,
            s: term,
            page,
            kind: "movie",
            y: year,
        };
        let search: OmdbSearch = self.get(&params).await?;
        read_search(search, term, page)
    }

    async fn fetch_detail(&self, external_id: &str) -> Result<MovieDetail, Error> {
        let params = DetailParams {
            apikey: &self.api_key,
            i: external_id,
            plot: "full",
        };
        let movie: OmdbMovie = self.get(&params).await?;
        read_detail(movie, external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_result_messages() {
        assert!(is_no_result_message("Movie not found!"));
        assert!(is_no_result_message("Too many results."));
        assert!(!is_no_result_message("Invalid API key!"));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = MovieInfoClient::with_base_url("key", "not a url");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    fn failed_search(message: &str) -> OmdbSearch {
        let raw = format!(r#"{{"Response":"False","Error":"{}"}}"#, message);
        serde_json::from_str(&raw).unwrap()
    }

    fn failed_detail(message: &str) -> OmdbMovie {
        let raw = format!(r#"{{"Response":"False","Error":"{}"}}"#, message);
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_search_without_matches_is_empty_page() {
        for message in ["Movie not found!", "Too many results."] {
            let page = read_search(failed_search(message), "x", 2).unwrap();
            assert!(page.is_empty());
            assert_eq!(page.total_count, 0);
            assert_eq!(page.page, 2);
        }
    }

    #[test]
    fn test_search_rejected_by_provider() {
        let result = read_search(failed_search("Invalid API key!"), "batman", 1);
        assert!(matches!(result, Err(Error::Provider(m)) if m == "Invalid API key!"));
    }

    #[test]
    fn test_detail_failures() {
        let result = read_detail(failed_detail("Incorrect IMDb ID."), "tt0");
        assert!(matches!(result, Err(Error::NotFound(_))));
        let result = read_detail(failed_detail("Too many results."), "tt0");
        assert!(matches!(result, Err(Error::NotFound(_))));
        let result = read_detail(failed_detail("Invalid API key!"), "tt0468569");
        assert!(matches!(result, Err(Error::Provider(m)) if m == "Invalid API key!"));
    }

    #[test]
    fn test_detail_without_error_message() {
        let movie: OmdbMovie = serde_json::from_str(r#"{"Response":"False"}"#).unwrap();
        let result = read_detail(movie, "tt0468569");
        assert!(matches!(result, Err(Error::Provider(m)) if m == "unknown provider error"));
    }

    #[test]
    fn test_search_envelope_success() {
        let raw = r#"{
            "Search": [
                {"Title": "Batman Begins", "Year": "2005", "imdbID": "tt0372784", "Type": "movie", "Poster": "N/A"}
            ],
            "totalResults": "587",
            "Response": "True"
        }"#;
        let search: OmdbSearch = serde_json::from_str(raw).unwrap();
        assert!(search.envelope.is_success());
        let item = normalize::search_item(search.search.into_iter().next().unwrap());
        assert_eq!(item.external_id, "tt0372784");
        assert_eq!(item.year, Some(2005));
        assert_eq!(item.poster_url, None);
    }
}
