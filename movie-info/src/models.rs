use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// What kind of title a provider record describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MovieKind {
    #[default]
    Movie,
    Series,
    Episode,
}

/// A single entry of the provider's ratings breakdown, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct RatingSource {
    pub source: String,
    pub value: String,
}

/// One hit of a title search. Only enough to decide which details to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub external_id: String,
    pub title_hint: String,
    pub year: Option<i32>,
    pub kind: MovieKind,
    pub poster_url: Option<String>,
}

/// A page of title search results.
///
/// An empty page is a successful answer: the provider found nothing.
/// `message` then carries the provider's explanation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    pub total_count: u32,
    pub page: u32,
    pub message: Option<String>,
}

impl SearchPage {
    pub fn empty(page: u32, message: Option<String>) -> Self {
        Self {
            items: vec![],
            total_count: 0,
            page,
            message,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Provider detail payload normalized into the internal record shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovieDetail {
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub released: Option<String>,
    pub runtime: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Vec<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub rating: Option<f64>,
    pub rating_text: Option<String>,
    pub metascore: Option<u32>,
    pub votes: Option<String>,
    pub ratings: Vec<RatingSource>,
    pub poster_url: Option<String>,
    pub kind: MovieKind,
}

impl MovieDetail {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}
