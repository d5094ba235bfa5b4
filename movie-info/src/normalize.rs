use crate::models::{MovieDetail, MovieKind, RatingSource, SearchItem};
use crate::omdb::{OmdbMovie, OmdbSearchItem, NOT_AVAILABLE};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    static ref LEADING_NUMBER: Regex = Regex::new(r"(\d+)").unwrap();
    static ref LEADING_YEAR: Regex = Regex::new(r"^\s*(\d{4})").unwrap();
}

/// Drops the provider's "N/A" sentinel and blank strings.
pub fn available(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != NOT_AVAILABLE)
}

/// Splits a comma-joined provider list ("Action, Crime, Drama") into trimmed entries.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    match value {
        Some(v) if v.trim() != NOT_AVAILABLE => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

/// "8.5" -> 8.5, "N/A" -> None. Values outside 0..=10 are rejected.
pub fn parse_rating(value: Option<&str>) -> Option<f64> {
    let rating: f64 = value?.trim().parse().ok()?;
    (0.0..=10.0).contains(&rating).then_some(rating)
}

/// "84" -> 84, "N/A" -> None. Values above 100 are rejected.
pub fn parse_metascore(value: Option<&str>) -> Option<u32> {
    let score: u32 = value?.trim().parse().ok()?;
    (score <= 100).then_some(score)
}

/// Leading integer of a runtime string: "148 min" -> 148.
pub fn parse_runtime_minutes(value: &str) -> Option<u32> {
    LEADING_NUMBER
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First year of a year string: "2008" -> 2008, "2005–2008" -> 2005.
pub fn parse_year(value: Option<&str>) -> Option<i32> {
    LEADING_YEAR
        .captures(value?)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn parse_kind(value: Option<&str>) -> MovieKind {
    value
        .and_then(|v| MovieKind::from_str(v.trim()).ok())
        .unwrap_or_default()
}

pub(crate) fn search_item(item: OmdbSearchItem) -> SearchItem {
    SearchItem {
        year: parse_year(item.year.as_deref()),
        kind: parse_kind(item.kind.as_deref()),
        poster_url: available(item.poster),
        external_id: item.imdb_id,
        title_hint: item.title,
    }
}

pub(crate) fn movie_detail(movie: OmdbMovie, requested_id: &str) -> MovieDetail {
    let runtime_minutes = movie.runtime.as_deref().and_then(|r| {
        if r.trim() == NOT_AVAILABLE {
            None
        } else {
            parse_runtime_minutes(r)
        }
    });

    MovieDetail {
        external_id: movie
            .imdb_id
            .unwrap_or_else(|| requested_id.to_string()),
        title: movie.title.unwrap_or_default(),
        year: parse_year(movie.year.as_deref()),
        released: available(movie.released),
        runtime: available(movie.runtime),
        runtime_minutes,
        genres: split_list(movie.genre.as_deref()),
        director: available(movie.director),
        writer: available(movie.writer),
        actors: split_list(movie.actors.as_deref()),
        plot: available(movie.plot),
        language: available(movie.language),
        country: available(movie.country),
        rating: parse_rating(movie.imdb_rating.as_deref()),
        rating_text: available(movie.imdb_rating),
        metascore: parse_metascore(movie.metascore.as_deref()),
        votes: available(movie.imdb_votes),
        ratings: movie
            .ratings
            .into_iter()
            .map(|r| RatingSource {
                source: r.source,
                value: r.value,
            })
            .collect(),
        poster_url: available(movie.poster),
        kind: parse_kind(movie.kind.as_deref()),
    }
}
