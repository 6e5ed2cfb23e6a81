//! jobdex: a local, continuously refreshed index of job postings
//!
//! Fetches postings from a fixed set of public recruiting APIs (three wire
//! formats, one canonical schema), persists them idempotently in SQLite
//! and serves full-text queries with a substring fallback.

pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod search;
pub mod sources;
pub mod store;
