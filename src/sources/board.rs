//! Board API adapter
//!
//! Two-call protocol: resolve the board's display name, then fetch the full
//! job list in one response. Supports conditional re-fetch through an
//! If-Modified-Since header; a 304 answer is a successful empty pass.

use super::{http_date, json_str, parse_iso, JobSource};
use crate::error::{Error, Result};
use crate::fetch::BackoffClient;
use crate::models::{collapse_whitespace, RawPosting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, IF_MODIFIED_SINCE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";

/// A job-board source identified by a board token
pub struct BoardSource {
    token: String,
    api_base: String,
}

impl BoardSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different API root (tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Resolve the organization display name, falling back to the token
    async fn fetch_org_name(&self, http: &BackoffClient) -> Result<String> {
        let url = format!("{}/{}", self.api_base, self.token);
        let response = http.get(&url, HeaderMap::new(), &[]).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::UnknownSource(format!(
                "board token not found: {}",
                self.token
            )));
        }
        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                url,
            });
        }

        let name = response
            .json::<Value>()
            .await
            .ok()
            .as_ref()
            .and_then(|v| json_str(&v["name"]));
        Ok(name.unwrap_or_else(|| self.token.clone()))
    }

    fn to_canonical(&self, org_name: &str, job: &Value) -> Option<RawPosting> {
        let url = json_str(&job["absolute_url"])?;

        Some(RawPosting {
            source_id: format!("board:{}", self.token),
            org_name: org_name.to_string(),
            title: collapse_whitespace(job["title"].as_str().unwrap_or_default()),
            description: job["content"].as_str().unwrap_or_default().trim().to_string(),
            location: json_str(&job["location"]["name"]),
            url,
            // Update time wins over create time when both are present
            posted_at: parse_iso(job["updated_at"].as_str())
                .or_else(|| parse_iso(job["created_at"].as_str())),
        })
    }
}

#[async_trait]
impl JobSource for BoardSource {
    fn label(&self) -> String {
        format!("board:{}", self.token)
    }

    async fn fetch(
        &self,
        http: &BackoffClient,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawPosting>> {
        let org_name = self.fetch_org_name(http).await?;

        let jobs_url = format!("{}/{}/jobs", self.api_base, self.token);
        let mut headers = HeaderMap::new();
        if let Some(since) = since {
            headers.insert(IF_MODIFIED_SINCE, http_date(since).parse().map_err(|_| {
                Error::Other("unrepresentable If-Modified-Since value".to_string())
            })?);
        }

        let response = http
            .get(&jobs_url, headers, &[("content", "true".to_string())])
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("Board {} not modified since last fetch", self.token);
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                url: jobs_url,
            });
        }

        let data: Value = response.json().await?;
        let jobs = data["jobs"].as_array().cloned().unwrap_or_default();

        let postings: Vec<RawPosting> = jobs
            .iter()
            .filter_map(|j| self.to_canonical(&org_name, j))
            .collect();

        if postings.len() < jobs.len() {
            debug!(
                "Board {}: skipped {} records without a canonical URL",
                self.token,
                jobs.len() - postings.len()
            );
        }

        Ok(postings)
    }
}
