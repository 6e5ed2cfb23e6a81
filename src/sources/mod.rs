//! Source adapters
//!
//! Each upstream recruiting platform speaks its own request shape,
//! pagination convention and payload layout. An adapter owns exactly one of
//! those shapes and maps it onto [`RawPosting`]; everything downstream of
//! this module is source-agnostic. Adapters form a closed set selected by
//! configuration, never by runtime type inspection.

mod board;
mod paginated;
mod postings;

pub use board::*;
pub use paginated::*;
pub use postings::*;

use crate::error::Result;
use crate::fetch::BackoffClient;
use crate::models::RawPosting;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// One fetchable source
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Stable label used for checkpoints and diagnostics
    fn label(&self) -> String;

    /// Fetch all currently visible postings.
    ///
    /// `since` is a conditional-fetch hint: adapters whose upstream supports
    /// it may answer with an empty sequence when nothing changed. Records
    /// without a usable canonical URL are skipped, not errors.
    async fn fetch(
        &self,
        http: &BackoffClient,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawPosting>>;
}

/// Format a timestamp as an HTTP-date for If-Modified-Since headers
pub(crate) fn http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an RFC 3339 timestamp, tolerating a trailing Z
pub(crate) fn parse_iso(s: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s?.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Normalize a canonical URL before fingerprinting: lower-cased host, no
/// trailing slash, query and fragment stripped
pub(crate) fn normalize_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)?;
    let origin = parsed.origin().ascii_serialization();
    let path = parsed.path().trim_end_matches('/');
    Ok(format!("{}{}", origin, path))
}

/// Pull a non-empty string out of a JSON value
pub(crate) fn json_str(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_format() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(http_date(dt), "Fri, 01 Mar 2024 12:30:00 GMT");
    }

    #[test]
    fn test_parse_iso() {
        assert!(parse_iso(Some("2024-03-01T12:30:00Z")).is_some());
        assert!(parse_iso(Some("2024-03-01T12:30:00+02:00")).is_some());
        assert!(parse_iso(Some("Posted Today")).is_none());
        assert!(parse_iso(None).is_none());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://ACME.Example.com/Careers/job/123/?src=feed#top").unwrap(),
            "https://acme.example.com/Careers/job/123"
        );
        assert_eq!(
            normalize_url("https://acme.example.com").unwrap(),
            "https://acme.example.com"
        );
    }
}
