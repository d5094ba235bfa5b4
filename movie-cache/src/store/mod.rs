//! Persistence of cached movie records.
//!
//! All cache reads go through [`RecordStore::find_fresh`], which never
//! returns a record whose `cache_expires_at` has passed. Raw enumeration
//! ([`RecordStore::all`], [`RecordStore::get`]) ignores freshness and is meant
//! for lifecycle bookkeeping.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::query::RecordQuery;
use crate::record::MovieRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movie_info::MovieDetail;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("failed to (de)serialize movie record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("timestamp {0} cannot be stored")]
    TimestampOutOfRange(DateTime<Utc>),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fresh records matching `query`, in no particular order.
    async fn find_fresh(
        &self,
        query: &RecordQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<MovieRecord>, StoreError>;

    /// The record stored under `external_id`, fresh or not.
    async fn get(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError>;

    /// Every stored record, fresh or not.
    async fn all(&self) -> Result<Vec<MovieRecord>, StoreError>;

    /// Inserts or replaces a whole record.
    async fn put(&self, record: MovieRecord) -> Result<(), StoreError>;

    /// Atomic find-and-update-or-insert for a search hit, see [`MovieRecord::merge_search`].
    async fn upsert_searched(
        &self,
        detail: MovieDetail,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError>;

    /// Atomic find-and-update-or-insert for a detail fetch, see [`MovieRecord::merge_detail`].
    async fn upsert_detail(
        &self,
        detail: MovieDetail,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError>;

    /// Refreshes counters and expiry of a fresh record and returns it.
    /// Stale or missing records are left alone and yield `None`.
    async fn touch_fresh(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MovieRecord>, StoreError>;

    async fn delete(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError>;

    /// Deletes every record with `cache_expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Deletes records last searched at or before `searched_before` with at most
    /// `max_search_count` searches, regardless of freshness.
    async fn delete_cold(
        &self,
        searched_before: DateTime<Utc>,
        max_search_count: u32,
    ) -> Result<usize, StoreError>;
}

#[cfg(test)]
pub(crate) mod tests {
    //! Behavior every backend must share.

    use super::*;
    use crate::record::tests::detail;
    use chrono::Duration;
    use std::sync::Arc;

    pub(crate) async fn freshness_is_enforced(store: &dyn RecordStore) {
        let now = Utc::now();
        let mut stale = MovieRecord::from_detail(
            detail("tt0000001", "Stale", Some(8.0), &[]),
            now - Duration::days(2),
        );
        stale.add_search_term("batman");
        store.put(stale).await.unwrap();

        let hits = store.find_fresh(&RecordQuery::for_term("batman"), now).await.unwrap();
        assert!(hits.is_empty());
        assert!(store.touch_fresh("tt0000001", now).await.unwrap().is_none());
        assert_eq!(store.all().await.unwrap().len(), 1);
        assert!(store.get("tt0000001").await.unwrap().is_some());
    }

    pub(crate) async fn search_upsert_never_duplicates(store: Arc<dyn RecordStore>) {
        let now = Utc::now();
        let mut handles = vec![];
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert_searched(
                        detail("tt0000002", "Same", Some(7.0), &[]),
                        &format!("term {}", i),
                        now,
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].total_search_count >= 1);
        assert!(all[0].search_terms.len() >= 1);
    }

    pub(crate) async fn filters_are_applied(store: &dyn RecordStore) {
        let now = Utc::now();
        store
            .upsert_searched(
                detail("tt0000003", "Action", Some(8.5), &["Action", "Crime"]),
                "mix",
                now,
            )
            .await
            .unwrap();
        store
            .upsert_searched(detail("tt0000004", "Comedy", Some(6.0), &["Comedy"]), "mix", now)
            .await
            .unwrap();
        store
            .upsert_searched(detail("tt0000005", "Unrated", None, &["Action"]), "mix", now)
            .await
            .unwrap();

        let query = RecordQuery {
            min_rating: Some(7.0),
            ..RecordQuery::for_term("MIX")
        };
        let hits = store.find_fresh(&query, now).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_id, "tt0000003");

        let query = RecordQuery {
            genres: vec!["action".to_string()],
            ..RecordQuery::for_term("mix")
        };
        assert_eq!(store.find_fresh(&query, now).await.unwrap().len(), 2);

        let query = RecordQuery {
            year: Some(1990),
            ..RecordQuery::for_term("mix")
        };
        assert!(store.find_fresh(&query, now).await.unwrap().is_empty());
    }

    pub(crate) async fn deletion_rules(store: &dyn RecordStore) {
        let now = Utc::now();
        let expired = MovieRecord::from_detail(
            detail("tt0000006", "Expired", None, &[]),
            now - Duration::days(2),
        );
        let mut cold = MovieRecord::from_detail(detail("tt0000007", "Cold", None, &[]), now);
        cold.last_searched_at = now - Duration::days(31);
        let mut cold_but_popular = cold.clone();
        cold_but_popular.external_id = "tt0000008".to_string();
        cold_but_popular.total_search_count = 2;

        store.put(expired).await.unwrap();
        store.put(cold).await.unwrap();
        store.put(cold_but_popular).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert_eq!(store.delete_expired(now).await.unwrap(), 0);
        assert_eq!(store.delete_cold(now - Duration::days(30), 1).await.unwrap(), 1);

        let remaining = store.all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].external_id, "tt0000008");

        let deleted = store.delete("tt0000008").await.unwrap();
        assert!(deleted.is_some());
        assert!(store.delete("tt0000008").await.unwrap().is_none());
    }
}
