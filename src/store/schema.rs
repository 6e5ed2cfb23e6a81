//! SQLite schema definition

/// SQL schema for the jobs database
pub const SCHEMA_SQL: &str = r#"
-- Jobs: one row per distinct posting, keyed by the URL fingerprint
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY,
    source_id TEXT NOT NULL,
    org_name TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    location TEXT,
    role_level TEXT,
    work_type TEXT,
    employment_type TEXT,
    city TEXT,
    state TEXT,
    country TEXT,
    remote INTEGER,
    post_url TEXT NOT NULL,
    identity_key TEXT NOT NULL UNIQUE,
    posted_at TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source_id);
CREATE INDEX IF NOT EXISTS idx_jobs_posted ON jobs(posted_at);
"#;

/// Full-text index over the searchable fields, kept in lockstep with the
/// jobs table by triggers so it is never stale to a reader after a write.
/// Applied separately: builds without FTS5 fall back to substring search.
pub const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS job_fts
USING fts5(title, description, org_name, location, content='jobs', content_rowid='id');

CREATE TRIGGER IF NOT EXISTS jobs_ai AFTER INSERT ON jobs BEGIN
  INSERT INTO job_fts(rowid, title, description, org_name, location)
  VALUES (new.id, new.title, new.description, new.org_name, COALESCE(new.location, ''));
END;

CREATE TRIGGER IF NOT EXISTS jobs_ad AFTER DELETE ON jobs BEGIN
  INSERT INTO job_fts(job_fts, rowid, title, description, org_name, location)
  VALUES ('delete', old.id, old.title, old.description, old.org_name, COALESCE(old.location, ''));
END;

CREATE TRIGGER IF NOT EXISTS jobs_au AFTER UPDATE ON jobs BEGIN
  INSERT INTO job_fts(job_fts, rowid, title, description, org_name, location)
  VALUES ('delete', old.id, old.title, old.description, old.org_name, COALESCE(old.location, ''));
  INSERT INTO job_fts(rowid, title, description, org_name, location)
  VALUES (new.id, new.title, new.description, new.org_name, COALESCE(new.location, ''));
END;
"#;
