//! SQLite-backed record store.
//!
//! Each movie is one JSON document in `movies.document`. The scalar columns
//! next to it duplicate the fields the cache path filters on so they can be
//! indexed; `movie_search_terms` indexes the search-term set and
//! `movie_genres` the lowercased genres by year. Timestamps are stored as
//! nanoseconds so the SQL comparisons agree with [`MovieRecord::is_fresh`].

use super::{RecordStore, StoreError};
use crate::query::RecordQuery;
use crate::record::MovieRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movie_info::MovieDetail;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: u32 = 2;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and brings its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        f(&mut conn)
    }

    fn upsert_with<F>(&self, external_id: &str, merge: F) -> Result<MovieRecord, StoreError>
    where
        F: FnOnce(Option<MovieRecord>) -> MovieRecord,
    {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let existing = load(&tx, external_id)?;
            let merged = merge(existing);
            write(&tx, &merged)?;
            tx.commit()?;
            Ok(merged)
        })
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS movies (
                external_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                year INTEGER,
                rating REAL,
                last_fetched_at INTEGER NOT NULL,
                cache_expires_at INTEGER NOT NULL,
                last_searched_at INTEGER NOT NULL,
                total_search_count INTEGER NOT NULL,
                document TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_movies_title_year ON movies(title, year DESC);
            CREATE INDEX IF NOT EXISTS idx_movies_rating ON movies(rating DESC);
            CREATE INDEX IF NOT EXISTS idx_movies_cache_expires_at ON movies(cache_expires_at);
            CREATE INDEX IF NOT EXISTS idx_movies_last_searched_at ON movies(last_searched_at);

            CREATE TABLE IF NOT EXISTS movie_search_terms (
                term TEXT NOT NULL,
                external_id TEXT NOT NULL REFERENCES movies(external_id) ON DELETE CASCADE,
                PRIMARY KEY (term, external_id)
            );
            CREATE INDEX IF NOT EXISTS idx_movie_search_terms_movie
                ON movie_search_terms(external_id);
            ",
        )?;
    }

    if version < 2 {
        if version == 1 {
            conn.execute_batch(
                "
                UPDATE movies SET
                    last_fetched_at = last_fetched_at * 1000000,
                    cache_expires_at = cache_expires_at * 1000000,
                    last_searched_at = last_searched_at * 1000000;
                ",
            )?;
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS movie_genres (
                genre TEXT NOT NULL,
                year INTEGER,
                external_id TEXT NOT NULL REFERENCES movies(external_id) ON DELETE CASCADE,
                PRIMARY KEY (genre, external_id)
            );
            CREATE INDEX IF NOT EXISTS idx_movie_genres_genre_year ON movie_genres(genre, year);
            CREATE INDEX IF NOT EXISTS idx_movie_genres_movie ON movie_genres(external_id);
            ",
        )?;

        let records = {
            let mut stmt = conn.prepare("SELECT document FROM movies")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        for document in records {
            write_genres(conn, &decode(&document)?)?;
        }
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn decode(document: &str) -> Result<MovieRecord, StoreError> {
    Ok(serde_json::from_str(document)?)
}

fn load(conn: &Connection, external_id: &str) -> Result<Option<MovieRecord>, StoreError> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM movies WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .optional()?;
    document.as_deref().map(decode).transpose()
}

fn nanos(at: DateTime<Utc>) -> Result<i64, StoreError> {
    at.timestamp_nanos_opt().ok_or(StoreError::TimestampOutOfRange(at))
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn write_genres(conn: &Connection, record: &MovieRecord) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM movie_genres WHERE external_id = ?1",
        params![record.external_id],
    )?;
    let mut insert_genre = conn.prepare_cached(
        "INSERT OR IGNORE INTO movie_genres (genre, year, external_id) VALUES (?1, ?2, ?3)",
    )?;
    for genre in &record.genres {
        insert_genre.execute(params![genre.to_lowercase(), record.year, record.external_id])?;
    }
    Ok(())
}

fn write(conn: &Connection, record: &MovieRecord) -> Result<(), StoreError> {
    let document = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO movies (external_id, title, year, rating, last_fetched_at, cache_expires_at,
                             last_searched_at, total_search_count, document)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(external_id) DO UPDATE SET
             title = ?2, year = ?3, rating = ?4, last_fetched_at = ?5, cache_expires_at = ?6,
             last_searched_at = ?7, total_search_count = ?8, document = ?9",
        params![
            record.external_id,
            record.title,
            record.year,
            record.rating_value,
            nanos(record.last_fetched_at)?,
            nanos(record.cache_expires_at)?,
            nanos(record.last_searched_at)?,
            record.total_search_count,
            document,
        ],
    )?;

    conn.execute(
        "DELETE FROM movie_search_terms WHERE external_id = ?1",
        params![record.external_id],
    )?;
    let mut insert_term = conn.prepare_cached(
        "INSERT OR IGNORE INTO movie_search_terms (term, external_id) VALUES (?1, ?2)",
    )?;
    for term in &record.search_terms {
        insert_term.execute(params![term, record.external_id])?;
    }
    write_genres(conn, record)
}

fn delete_where(
    conn: &mut Connection,
    condition: &str,
    values: Vec<Value>,
) -> Result<usize, StoreError> {
    let sql = format!("DELETE FROM movies WHERE {}", condition);
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_fresh(
        &self,
        query: &RecordQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<MovieRecord>, StoreError> {
        // Narrow with the indexed columns, then apply the full predicate on the documents.
        let mut sql = String::from("SELECT m.document FROM movies m");
        let mut values: Vec<Value> = vec![];

        if let Some(term) = &query.search_term {
            sql.push_str(
                " JOIN movie_search_terms t ON t.external_id = m.external_id AND t.term = ?",
            );
            values.push(Value::Text(term.clone()));
        }
        sql.push_str(" WHERE m.cache_expires_at > ?");
        values.push(Value::Integer(nanos(now)?));
        if let Some(year) = query.year {
            sql.push_str(" AND m.year = ?");
            values.push(Value::Integer(year.into()));
        }
        if let Some(min_rating) = query.min_rating {
            sql.push_str(" AND m.rating >= ?");
            values.push(Value::Real(min_rating));
        }
        if !query.genres.is_empty() {
            // Genres are stored lowercased; LIKE keeps the substring rule.
            let any_genre =
                vec!["g.genre LIKE ? ESCAPE '\\'"; query.genres.len()].join(" OR ");
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM movie_genres g WHERE g.external_id = m.external_id",
            );
            if let Some(year) = query.year {
                sql.push_str(" AND g.year = ?");
                values.push(Value::Integer(year.into()));
            }
            sql.push_str(&format!(" AND ({}))", any_genre));
            for genre in &query.genres {
                values.push(Value::Text(format!("%{}%", like_escape(&genre.to_lowercase()))));
            }
        }

        let documents = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })?;

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let record = decode(&document)?;
            if query.matches(&record, now) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn get(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError> {
        self.with_conn(|conn| load(conn, external_id))
    }

    async fn all(&self) -> Result<Vec<MovieRecord>, StoreError> {
        let documents = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT document FROM movies")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })?;
        documents.iter().map(|d| decode(d)).collect()
    }

    async fn put(&self, record: MovieRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            write(&tx, &record)?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn upsert_searched(
        &self,
        detail: MovieDetail,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError> {
        let id = detail.external_id.clone();
        self.upsert_with(&id, |existing| {
            MovieRecord::merge_search(existing, detail, term, now)
        })
    }

    async fn upsert_detail(
        &self,
        detail: MovieDetail,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError> {
        let id = detail.external_id.clone();
        self.upsert_with(&id, |existing| {
            MovieRecord::merge_detail(existing, detail, now)
        })
    }

    async fn touch_fresh(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MovieRecord>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(mut record) = load(&tx, external_id)? else {
                return Ok(None);
            };
            if !record.is_fresh(now) {
                return Ok(None);
            }
            record.refresh(now);
            write(&tx, &record)?;
            tx.commit()?;
            Ok(Some(record))
        })
    }

    async fn delete(&self, external_id: &str) -> Result<Option<MovieRecord>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let existing = load(&tx, external_id)?;
            if existing.is_some() {
                tx.execute(
                    "DELETE FROM movies WHERE external_id = ?1",
                    params![external_id],
                )?;
            }
            tx.commit()?;
            Ok(existing)
        })
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            delete_where(
                conn,
                "cache_expires_at <= ?1",
                vec![Value::Integer(nanos(now)?)],
            )
        })
    }

    async fn delete_cold(
        &self,
        searched_before: DateTime<Utc>,
        max_search_count: u32,
    ) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            delete_where(
                conn,
                "last_searched_at <= ?1 AND total_search_count <= ?2",
                vec![
                    Value::Integer(nanos(searched_before)?),
                    Value::Integer(max_search_count.into()),
                ],
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::cache_ttl;
    use crate::record::tests::detail;
    use crate::store::tests as shared;
    use tempdir::TempDir;

    #[tokio::test]
    async fn test_freshness_is_enforced() {
        shared::freshness_is_enforced(&SqliteStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_search_upsert_never_duplicates() {
        shared::search_upsert_never_duplicates(Arc::new(SqliteStore::open_in_memory().unwrap()))
            .await;
    }

    #[tokio::test]
    async fn test_filters_are_applied() {
        shared::filters_are_applied(&SqliteStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_deletion_rules() {
        shared::deletion_rules(&SqliteStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_search_terms_cascade_on_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_searched(detail("tt0000010", "Gone", Some(7.0), &[]), "gone", Utc::now())
            .await
            .unwrap();
        store.delete("tt0000010").await.unwrap();

        let terms: i64 = store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM movie_search_terms", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(terms, 0);
    }

    fn count(store: &SqliteStore, sql: &str) -> i64 {
        store
            .with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[tokio::test]
    async fn test_expiry_boundary_matches_record_freshness() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = Utc::now();
        let fetched_at = base - cache_ttl() + chrono::Duration::microseconds(700);
        let record = MovieRecord::from_detail(
            detail("tt0000020", "Edge", Some(7.0), &[]),
            fetched_at,
        );
        let expires_at = record.cache_expires_at;
        store.put(record.clone()).await.unwrap();

        let now = base + chrono::Duration::microseconds(300);
        assert!(record.is_fresh(now));
        let hits = store.find_fresh(&RecordQuery::fresh(), now).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.delete_expired(now).await.unwrap(), 0);

        let just_before = expires_at - chrono::Duration::nanoseconds(1);
        assert_eq!(store.find_fresh(&RecordQuery::fresh(), just_before).await.unwrap().len(), 1);
        assert!(store.find_fresh(&RecordQuery::fresh(), expires_at).await.unwrap().is_empty());
        assert_eq!(store.delete_expired(expires_at).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_genre_index_follows_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let mut record = store
            .upsert_searched(
                detail("tt0000021", "Indexed", Some(8.0), &["Action", "Science Fiction"]),
                "indexed",
                now,
            )
            .await
            .unwrap();
        assert_eq!(
            count(
                &store,
                "SELECT COUNT(*) FROM movie_genres WHERE genre = 'science fiction' AND year = 2008"
            ),
            1
        );

        let by_genre = |genres: &[&str]| RecordQuery {
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..RecordQuery::fresh()
        };
        assert_eq!(store.find_fresh(&by_genre(&["FICTION"]), now).await.unwrap().len(), 1);
        assert_eq!(store.find_fresh(&by_genre(&["horror", "act"]), now).await.unwrap().len(), 1);
        assert!(store.find_fresh(&by_genre(&["%"]), now).await.unwrap().is_empty());
        let year_and_genre = RecordQuery {
            year: Some(1999),
            ..by_genre(&["action"])
        };
        assert!(store.find_fresh(&year_and_genre, now).await.unwrap().is_empty());

        record.genres = vec!["Drama".to_string()];
        store.put(record).await.unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM movie_genres"), 1);
        assert!(store.find_fresh(&by_genre(&["action"]), now).await.unwrap().is_empty());

        store.delete("tt0000021").await.unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM movie_genres"), 0);
    }

    #[tokio::test]
    async fn test_migrates_version_one_schema() {
        let now = Utc::now();
        let mut record = MovieRecord::from_detail(
            detail("tt0000022", "Legacy", Some(6.5), &["Crime"]),
            now,
        );
        record.add_search_term("legacy");

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE movies (
                external_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                year INTEGER,
                rating REAL,
                last_fetched_at INTEGER NOT NULL,
                cache_expires_at INTEGER NOT NULL,
                last_searched_at INTEGER NOT NULL,
                total_search_count INTEGER NOT NULL,
                document TEXT NOT NULL
            );
            CREATE TABLE movie_search_terms (
                term TEXT NOT NULL,
                external_id TEXT NOT NULL REFERENCES movies(external_id) ON DELETE CASCADE,
                PRIMARY KEY (term, external_id)
            );
            PRAGMA user_version = 1;
            ",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO movies VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.external_id,
                record.title,
                record.year,
                record.rating_value,
                record.last_fetched_at.timestamp_millis(),
                record.cache_expires_at.timestamp_millis(),
                record.last_searched_at.timestamp_millis(),
                record.total_search_count,
                serde_json::to_string(&record).unwrap(),
            ],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO movie_search_terms (term, external_id) VALUES ('legacy', ?1)",
            params![record.external_id],
        )
        .unwrap();

        let store = SqliteStore::from_connection(conn).unwrap();
        let version: i64 = count(&store, "PRAGMA user_version");
        assert_eq!(version, i64::from(SCHEMA_VERSION));
        assert_eq!(
            store.find_fresh(&RecordQuery::for_term("legacy"), now).await.unwrap().len(),
            1
        );
        assert_eq!(count(&store, "SELECT COUNT(*) FROM movie_genres WHERE genre = 'crime'"), 1);
        assert_eq!(store.delete_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new("movie-cache").unwrap();
        let path = dir.path().join("movies.db");
        let now = Utc::now();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert_searched(detail("tt0000011", "Kept", Some(8.1), &["Drama"]), "kept", now)
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let hits = store
            .find_fresh(&RecordQuery::for_term("kept"), now)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].genres, vec!["Drama"]);
    }
}
