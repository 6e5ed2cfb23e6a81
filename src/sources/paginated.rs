//! Paginated search API adapter
//!
//! Repeated page requests against one endpoint. Most tenants accept a POST
//! with a JSON body; some only take GET with query parameters, so a 400/405
//! answer retransmits the same query as a GET. Pagination stops on a short
//! or empty page, or at a fixed page cap that guards against endpoints
//! that never stop paginating.

use super::{json_str, normalize_url, parse_iso, JobSource};
use crate::error::{Error, Result};
use crate::fetch::BackoffClient;
use crate::models::{collapse_whitespace, RawPosting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, REFERER};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// A paginated-search source identified by its jobs endpoint URL
pub struct PaginatedSource {
    endpoint: Url,
    search_text: String,
    page_limit: u32,
    max_pages: u32,
}

impl PaginatedSource {
    pub fn new(endpoint: Url, page_limit: u32, max_pages: u32) -> Self {
        Self {
            endpoint,
            search_text: String::new(),
            page_limit,
            max_pages,
        }
    }

    /// Restrict the upstream search to a text query
    pub fn with_search_text(mut self, search_text: impl Into<String>) -> Self {
        self.search_text = search_text.into();
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, "application/json, text/plain, */*".parse().expect("static header"));
        // Some tenants reject requests without a same-site referer;
        // /x/y/<TENANT>/<SITE>/jobs maps to /en-US/<SITE>
        if let Ok(referer) = guess_referer(&self.endpoint).parse() {
            headers.insert(REFERER, referer);
        }
        headers
    }

    /// Fetch one page, falling back from POST-with-body to GET-with-params
    async fn fetch_page(&self, http: &BackoffClient, offset: u32) -> Result<Value> {
        let body = json!({
            "appliedFacets": {},
            "limit": self.page_limit,
            "offset": offset,
            "searchText": self.search_text,
        });

        let mut response = http
            .post_json(self.endpoint.as_str(), self.headers(), &body)
            .await?;

        if matches!(response.status().as_u16(), 400 | 405) {
            debug!("Endpoint {} rejected POST, retrying as GET", self.endpoint);
            response = http
                .get(
                    self.endpoint.as_str(),
                    self.headers(),
                    &[
                        ("limit", self.page_limit.to_string()),
                        ("offset", offset.to_string()),
                        ("searchText", self.search_text.clone()),
                    ],
                )
                .await?;
        }

        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                url: self.endpoint.to_string(),
            });
        }

        Ok(response.json().await?)
    }

    fn to_canonical(&self, record: &Value) -> Option<RawPosting> {
        let title = collapse_whitespace(record["title"].as_str().unwrap_or_default());
        if title.is_empty() {
            return None;
        }

        // The public URL is the endpoint's origin joined with the
        // source-supplied relative path, normalized before fingerprinting
        let external_path = json_str(&record["externalPath"])
            .or_else(|| json_str(&record["externalUrlPath"]))?;
        let origin = self.endpoint.origin().ascii_serialization();
        let url = normalize_url(&format!("{}{}", origin, external_path)).ok()?;

        let org_name = record["subtitles"][0]["title"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.label());

        let location = json_str(&record["locationsText"]).or_else(|| json_str(&record["location"]));

        // Page listings rarely carry machine-readable dates; keep what parses
        let posted_at = parse_iso(record["postedOn"].as_str())
            .or_else(|| parse_iso(record["postedDate"].as_str()))
            .or_else(|| parse_iso(record["createdOn"].as_str()));

        Some(RawPosting {
            source_id: self.label(),
            org_name,
            title,
            description: String::new(),
            location,
            url,
            posted_at,
        })
    }
}

/// Postings may sit at the top level or under a data envelope
fn extract_postings(payload: &Value) -> Vec<Value> {
    payload["jobPostings"]
        .as_array()
        .or_else(|| payload["data"]["jobPostings"].as_array())
        .cloned()
        .unwrap_or_default()
}

fn guess_referer(endpoint: &Url) -> String {
    let segments: Vec<&str> = endpoint
        .path()
        .trim_matches('/')
        .split('/')
        .collect();
    let site = if segments.len() >= 5 { segments[3] } else { "" };
    let path = if site.is_empty() {
        "/".to_string()
    } else {
        format!("/en-US/{}", site)
    };
    format!("{}{}", endpoint.origin().ascii_serialization(), path)
}

#[async_trait]
impl JobSource for PaginatedSource {
    fn label(&self) -> String {
        format!("paginated:{}", self.endpoint)
    }

    async fn fetch(
        &self,
        http: &BackoffClient,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawPosting>> {
        let mut postings = Vec::new();
        let mut offset = 0u32;

        for _ in 0..self.max_pages {
            let payload = self.fetch_page(http, offset).await?;
            let page = extract_postings(&payload);
            if page.is_empty() {
                break;
            }

            postings.extend(page.iter().filter_map(|r| self.to_canonical(r)));

            if (page.len() as u32) < self.page_limit {
                break;
            }
            offset += self.page_limit;
        }

        Ok(postings)
    }
}
