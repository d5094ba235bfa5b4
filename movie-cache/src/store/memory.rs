use super::{RecordStore, StoreError};
use crate::query::RecordQuery;
use crate::record::MovieRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use movie_info::MovieDetail;

/// In-process record store. Per-key entry locking makes every upsert atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, MovieRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn upsert_with<F>(&self, external_id: String, merge: F) -> MovieRecord
    where
        F: FnOnce(Option<MovieRecord>) -> MovieRecord,
    {
        match self.records.entry(external_id) {
            Entry::Occupied(mut entry) => {
                let merged = merge(Some(entry.get().clone()));
                entry.insert(merged.clone());
                merged
            }
            Entry::Vacant(entry) => {
                let merged = merge(None);
                entry.insert(merged.clone());
                merged
            }
        }
    }

    fn retain_counting<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&MovieRecord) -> bool,
    {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let kept = keep(record);
            if !kept {
                removed += 1;
            }
            kept
        });
        removed
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_fresh(
        &self,
        query: &RecordQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<MovieRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| query.matches(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError> {
        Ok(self.records.get(external_id).map(|r| r.value().clone()))
    }

    async fn all(&self) -> Result<Vec<MovieRecord>, StoreError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn put(&self, record: MovieRecord) -> Result<(), StoreError> {
        self.records.insert(record.external_id.clone(), record);
        Ok(())
    }

    async fn upsert_searched(
        &self,
        detail: MovieDetail,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError> {
        let id = detail.external_id.clone();
        Ok(self.upsert_with(id, |existing| {
            MovieRecord::merge_search(existing, detail, term, now)
        }))
    }

    async fn upsert_detail(
        &self,
        detail: MovieDetail,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError> {
        let id = detail.external_id.clone();
        Ok(self.upsert_with(id, |existing| {
            MovieRecord::merge_detail(existing, detail, now)
        }))
    }

    async fn touch_fresh(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MovieRecord>, StoreError> {
        let Some(mut record) = self.records.get_mut(external_id) else {
            return Ok(None);
        };
        if !record.is_fresh(now) {
            return Ok(None);
        }
        record.refresh(now);
        Ok(Some(record.value().clone()))
    }

    async fn delete(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError> {
        Ok(self.records.remove(external_id).map(|(_, record)| record))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.retain_counting(|record| record.is_fresh(now)))
    }

    async fn delete_cold(
        &self,
        searched_before: DateTime<Utc>,
        max_search_count: u32,
    ) -> Result<usize, StoreError> {
        Ok(self.retain_counting(|record| {
            !(record.last_searched_at <= searched_before
                && record.total_search_count <= max_search_count)
        }))
    }
}
