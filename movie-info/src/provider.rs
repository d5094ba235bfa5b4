use crate::{Error, MovieDetail, SearchPage};
use async_trait::async_trait;

/// A source of movie metadata keyed by a stable external identifier.
#[async_trait]
pub trait MovieProvider: Send + Sync {
    /// Searches titles. A page without items is a successful "nothing found".
    async fn search_by_title(
        &self,
        term: &str,
        page: u32,
        year: Option<i32>,
    ) -> Result<SearchPage, Error>;

    /// Fetches and normalizes the full record of one title.
    async fn fetch_detail(&self, external_id: &str) -> Result<MovieDetail, Error>;
}
