//! Query execution against the job store
//!
//! Two paths, one projection: the indexed path matches through the
//! full-text table, the fallback path uses case-insensitive substring
//! containment. The path is chosen by store capability at startup, never
//! by query content, and callers cannot tell which one served them.

use crate::error::Result;
use crate::store::JobStore;
use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;

/// The common result projection served by both search paths
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub org_name: String,
    pub location: Option<String>,
    pub post_url: String,
    pub posted_at: Option<String>,
}

/// Newest postings first; rows without a source timestamp sort last and
/// tie-break on when the pipeline first saw them
const ORDER_AND_LIMIT: &str =
    " ORDER BY jobs.posted_at IS NULL, jobs.posted_at DESC, jobs.first_seen_at DESC LIMIT ?";

const PROJECTION: &str =
    "SELECT jobs.title, jobs.org_name, jobs.location, jobs.post_url, jobs.posted_at";

/// Query executor over a [`JobStore`]
pub struct SearchEngine<'a> {
    store: &'a JobStore,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a JobStore) -> Self {
        Self { store }
    }

    /// Run a free-text query with an optional exact location filter
    pub async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        if self.store.fts_enabled() && !query.trim().is_empty() {
            self.search_indexed(query, location, limit).await
        } else {
            self.search_fallback(query, location, limit).await
        }
    }

    /// Indexed path: full-text match joined back to the jobs table
    pub(crate) async fn search_indexed(
        &self,
        query: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        debug!("Searching (indexed): {}", query);

        let mut sql = format!(
            "{} FROM job_fts JOIN jobs ON jobs.id = job_fts.rowid WHERE job_fts MATCH ?",
            PROJECTION
        );
        if location.is_some() {
            sql.push_str(" AND jobs.location = ?");
        }
        sql.push_str(ORDER_AND_LIMIT);

        let mut q = sqlx::query_as::<_, SearchHit>(&sql).bind(query);
        if let Some(loc) = location {
            q = q.bind(loc);
        }
        Ok(q.bind(limit).fetch_all(self.store.pool()).await?)
    }

    /// Fallback path: case-insensitive substring containment over the same
    /// fields, same filter and ordering semantics
    pub(crate) async fn search_fallback(
        &self,
        query: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        debug!("Searching (fallback): {}", query);

        let like = format!("%{}%", query);
        let mut sql = format!(
            "{} FROM jobs WHERE (jobs.title LIKE ? OR jobs.description LIKE ? \
             OR jobs.org_name LIKE ? OR jobs.location LIKE ?)",
            PROJECTION
        );
        if location.is_some() {
            sql.push_str(" AND jobs.location = ?");
        }
        sql.push_str(ORDER_AND_LIMIT);

        let mut q = sqlx::query_as::<_, SearchHit>(&sql)
            .bind(&like)
            .bind(&like)
            .bind(&like)
            .bind(&like);
        if let Some(loc) = location {
            q = q.bind(loc);
        }
        Ok(q.bind(limit).fetch_all(self.store.pool()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Derived, RawPosting};
    use crate::normalize::normalize;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn seeded_store() -> (JobStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::open(&tmp.path().join("test.db")).await.unwrap();

        let rows = [
            (
                "https://x.co/a",
                "Senior Backend Engineer",
                "Remote - USA",
                Some((2024, 3, 2)),
            ),
            (
                "https://x.co/b",
                "Backend Engineer",
                "Austin, TX, USA",
                Some((2024, 3, 5)),
            ),
            ("https://x.co/c", "Backend Engineer II", "Remote - USA", None),
            (
                "https://x.co/d",
                "Pastry Chef",
                "Paris, France",
                Some((2024, 3, 9)),
            ),
        ];

        for (url, title, location, date) in rows {
            let raw = RawPosting {
                source_id: "board:acme".to_string(),
                org_name: "Acme Corp".to_string(),
                title: title.to_string(),
                description: "Description".to_string(),
                location: Some(location.to_string()),
                url: url.to_string(),
                posted_at: date
                    .map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
            };
            let derived: Derived = normalize(title, "", Some(location));
            store.upsert(&raw, &derived).await.unwrap();
        }

        (store, tmp)
    }

    #[tokio::test]
    async fn test_search_orders_newest_first_nulls_last() {
        let (store, _tmp) = seeded_store().await;
        let engine = SearchEngine::new(&store);

        let hits = engine.search("backend", None, 20).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].post_url, "https://x.co/b");
        assert_eq!(hits[1].post_url, "https://x.co/a");
        // Null posted_at sorts last
        assert_eq!(hits[2].post_url, "https://x.co/c");
    }

    #[tokio::test]
    async fn test_location_filter_is_exact() {
        let (store, _tmp) = seeded_store().await;
        let engine = SearchEngine::new(&store);

        let hits = engine
            .search("backend", Some("Remote - USA"), 20)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.location.as_deref() == Some("Remote - USA")));
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let (store, _tmp) = seeded_store().await;
        let engine = SearchEngine::new(&store);

        let hits = engine.search("backend", None, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].post_url, "https://x.co/b");
    }

    #[tokio::test]
    async fn test_both_paths_agree_on_plain_queries() {
        let (store, _tmp) = seeded_store().await;
        let engine = SearchEngine::new(&store);

        let indexed = engine.search_indexed("backend", None, 20).await.unwrap();
        let fallback = engine.search_fallback("backend", None, 20).await.unwrap();

        let project = |hits: &[SearchHit]| {
            hits.iter()
                .map(|h| {
                    (
                        h.title.clone(),
                        h.org_name.clone(),
                        h.location.clone(),
                        h.post_url.clone(),
                        h.posted_at.clone(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(project(&indexed), project(&fallback));
    }

    #[tokio::test]
    async fn test_fallback_matches_org_and_description() {
        let (store, _tmp) = seeded_store().await;
        let engine = SearchEngine::new(&store);

        let hits = engine.search_fallback("acme", None, 20).await.unwrap();
        assert_eq!(hits.len(), 4);
    }
}
