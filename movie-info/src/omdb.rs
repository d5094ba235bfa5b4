//! Wire format of the OMDb API.
//!
//! Every response is wrapped in the same envelope: `Response` is `"True"` or
//! `"False"`, and on `"False"` the reason is in `Error`. The HTTP status is
//! not a reliable success signal.

use serde::{Deserialize, Serialize};

/// Provider sentinel for a missing value.
pub(crate) const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.response.eq_ignore_ascii_case("true")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OmdbSearch {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "Search", default)]
    pub search: Vec<OmdbSearchItem>,
    #[serde(rename = "totalResults")]
    pub total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OmdbSearchItem {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    #[serde(rename = "Poster")]
    pub poster: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OmdbRating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OmdbMovie {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub released: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub poster: Option<String>,
    #[serde(default)]
    pub ratings: Vec<OmdbRating>,
    pub metascore: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    pub imdb_votes: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchParams<'a> {
    pub apikey: &'a str,
    pub s: &'a str,
    pub page: u32,
    #[serde(rename = "type")]
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetailParams<'a> {
    pub apikey: &'a str,
    pub i: &'a str,
    pub plot: &'a str,
}
