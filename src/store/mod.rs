//! Canonical job storage in SQLite
//!
//! The store owns the schema, performs idempotent upserts keyed by the
//! URL fingerprint, and keeps the full-text index synchronized through
//! triggers on the same write path. Ingestion never deletes rows.

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use crate::models::{Derived, JobPosting, RawPosting};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info, warn};

/// Job store handle
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
    fts_enabled: bool,
}

impl JobStore {
    /// Open (and if necessary create) the database at the given path
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        // Capability detection happens once at startup: if this build of
        // SQLite lacks FTS5, search degrades to substring matching.
        let fts_enabled = match sqlx::raw_sql(FTS_SQL).execute(&pool).await {
            Ok(_) => sqlx::query("SELECT 1 FROM job_fts LIMIT 1")
                .fetch_optional(&pool)
                .await
                .is_ok(),
            Err(e) => {
                warn!("Full-text index unavailable, using substring search: {}", e);
                false
            }
        };

        if fts_enabled {
            debug!("Full-text search index active");
        } else {
            info!("Full-text search unavailable; queries will use substring matching");
        }

        Ok(Self { pool, fts_enabled })
    }

    /// Whether the indexed search path is available
    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update one posting, keyed by the URL fingerprint.
    ///
    /// A new identity gets `first_seen_at = last_seen_at = now`. A known
    /// identity advances `last_seen_at` and takes the incoming display
    /// fields (sources may correct typos), but an incoming null never
    /// erases a known `posted_at`, and derived attributes are never
    /// cleared once set; the remote flag in particular is sticky.
    pub async fn upsert(&self, raw: &RawPosting, derived: &Derived) -> Result<()> {
        if raw.url.trim().is_empty() {
            return Err(Error::MalformedRecord(format!(
                "posting '{}' has no canonical URL",
                raw.title
            )));
        }

        let now = Utc::now().to_rfc3339();
        let posted_at = raw.posted_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO jobs (source_id, org_name, title, description, location,
                              role_level, work_type, employment_type, city, state, country, remote,
                              post_url, identity_key, posted_at, first_seen_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity_key) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                org_name = excluded.org_name,
                title = excluded.title,
                description = excluded.description,
                location = excluded.location,
                posted_at = COALESCE(excluded.posted_at, jobs.posted_at),
                role_level = COALESCE(excluded.role_level, jobs.role_level),
                work_type = COALESCE(excluded.work_type, jobs.work_type),
                employment_type = COALESCE(excluded.employment_type, jobs.employment_type),
                city = COALESCE(excluded.city, jobs.city),
                state = COALESCE(excluded.state, jobs.state),
                country = COALESCE(excluded.country, jobs.country),
                remote = CASE WHEN jobs.remote = 1 THEN 1 ELSE excluded.remote END
            "#,
        )
        .bind(&raw.source_id)
        .bind(&raw.org_name)
        .bind(&raw.title)
        .bind(&raw.description)
        .bind(&raw.location)
        .bind(derived.role_level.map(|v| v.to_string()))
        .bind(derived.work_type.map(|v| v.to_string()))
        .bind(derived.employment_type.map(|v| v.to_string()))
        .bind(&derived.city)
        .bind(&derived.state)
        .bind(&derived.country)
        .bind(derived.remote as i64)
        .bind(&raw.url)
        .bind(raw.identity_key())
        .bind(posted_at)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a posting by its identity key
    pub async fn get_by_identity(&self, identity_key: &str) -> Result<Option<JobPosting>> {
        let posting =
            sqlx::query_as::<_, JobPosting>("SELECT * FROM jobs WHERE identity_key = ?")
                .bind(identity_key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(posting)
    }

    /// Total number of stored postings
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Posting counts per source, for status reporting
    pub async fn counts_by_source(&self) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT source_id, COUNT(*) FROM jobs GROUP BY source_id ORDER BY source_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity_key;
    use crate::normalize::normalize;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn setup() -> (JobStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::open(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    fn posting(url: &str, title: &str, location: Option<&str>) -> RawPosting {
        RawPosting {
            source_id: "board:acme".to_string(),
            org_name: "Acme Corp".to_string(),
            title: title.to_string(),
            description: "Build things".to_string(),
            location: location.map(String::from),
            url: url.to_string(),
            posted_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    fn derived_for(raw: &RawPosting) -> Derived {
        normalize(&raw.title, &raw.description, raw.location.as_deref())
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (store, _tmp) = setup().await;
        let raw = posting("https://x.co/a", "Senior Backend Engineer", Some("Remote - USA"));

        store.upsert(&raw, &derived_for(&raw)).await.unwrap();
        let first = store
            .get_by_identity(&raw.identity_key())
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.upsert(&raw, &derived_for(&raw)).await.unwrap();
        let second = store
            .get_by_identity(&raw.identity_key())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(first.first_seen_at, second.first_seen_at);
        assert!(second.last_seen_at >= first.last_seen_at);
        assert_eq!(second.role_level.as_deref(), Some("senior"));
        assert_eq!(second.work_type.as_deref(), Some("remote"));
        assert_eq!(second.remote, Some(1));
    }

    #[tokio::test]
    async fn test_same_url_from_two_sources_collapses() {
        let (store, _tmp) = setup().await;

        let mut a = posting("https://x.co/a", "Engineer", None);
        let mut b = posting("https://x.co/a", "Engineer", None);
        a.source_id = "board:acme".to_string();
        b.source_id = "postings:acme".to_string();

        store.upsert(&a, &derived_for(&a)).await.unwrap();
        store.upsert(&b, &derived_for(&b)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_null_posted_at_never_clears_known_value() {
        let (store, _tmp) = setup().await;

        let with_date = posting("https://x.co/a", "Engineer", None);
        store.upsert(&with_date, &derived_for(&with_date)).await.unwrap();

        let mut without_date = with_date.clone();
        without_date.posted_at = None;
        store
            .upsert(&without_date, &derived_for(&without_date))
            .await
            .unwrap();

        let row = store
            .get_by_identity(&identity_key("https://x.co/a"))
            .await
            .unwrap()
            .unwrap();
        assert!(row.posted_at.is_some());
    }

    #[tokio::test]
    async fn test_remote_flag_is_sticky() {
        let (store, _tmp) = setup().await;

        let remote = posting("https://x.co/a", "Engineer", Some("Remote"));
        store.upsert(&remote, &derived_for(&remote)).await.unwrap();

        // A later write that fails to detect "remote" must not clear the flag
        let onsite = posting("https://x.co/a", "Engineer", Some("Austin, TX"));
        store.upsert(&onsite, &derived_for(&onsite)).await.unwrap();

        let row = store
            .get_by_identity(&identity_key("https://x.co/a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.remote, Some(1));
        // Display fields do take the newest values
        assert_eq!(row.location.as_deref(), Some("Austin, TX"));
    }

    #[tokio::test]
    async fn test_blank_url_is_malformed() {
        let (store, _tmp) = setup().await;
        let raw = posting("  ", "Engineer", None);
        let err = store.upsert(&raw, &Derived::default()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
