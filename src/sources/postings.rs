//! Postings API adapter
//!
//! Single-call protocol: one GET returns every public posting for a company
//! slug. The payload is loosely shaped; location in particular may arrive
//! as a string, an object or a list and is normalized to a single string.

use super::{json_str, JobSource};
use crate::error::{Error, Result};
use crate::fetch::BackoffClient;
use crate::models::{collapse_whitespace, RawPosting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.lever.co/v0/postings";

/// A postings source identified by a company slug
pub struct PostingsSource {
    company: String,
    api_base: String,
}

impl PostingsSource {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different API root (tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn to_canonical(&self, job: &Value) -> Option<RawPosting> {
        let url = json_str(&job["hostedUrl"]).or_else(|| json_str(&job["applyUrl"]))?;

        let title = collapse_whitespace(
            job["text"]
                .as_str()
                .or_else(|| job["title"].as_str())
                .unwrap_or_default(),
        );

        let categories = &job["categories"];
        let org_name = json_str(&categories["team"])
            .or_else(|| json_str(&categories["department"]))
            .unwrap_or_else(|| self.company.clone());

        // Prefer the structured workplace-location list, then the category
        // field, then country, then the flat location field
        let location = first_location(&job["workplaceLocations"])
            .or_else(|| json_str(&categories["location"]))
            .or_else(|| json_str(&job["country"]))
            .or_else(|| first_location(&job["location"]));

        let description = job["lists"]
            .as_array()
            .map(|lists| {
                lists
                    .iter()
                    .filter_map(|x| x["text"].as_str())
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|d| !d.is_empty())
            .or_else(|| json_str(&job["descriptionPlain"]))
            .or_else(|| json_str(&job["description"]))
            .unwrap_or_default();

        // Millisecond epoch timestamps, update time preferred
        let posted_at = job["updatedAt"]
            .as_i64()
            .or_else(|| job["createdAt"].as_i64())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        Some(RawPosting {
            source_id: format!("postings:{}", self.company),
            org_name,
            title,
            description,
            location,
            url,
            posted_at,
        })
    }
}

/// Collapse a string/object/list location candidate into one string
fn first_location(candidate: &Value) -> Option<String> {
    match candidate {
        Value::String(_) => json_str(candidate),
        Value::Object(_) => json_str(&candidate["name"]).or_else(|| json_str(&candidate["location"])),
        Value::Array(items) => items.iter().find_map(first_location),
        _ => None,
    }
}

#[async_trait]
impl JobSource for PostingsSource {
    fn label(&self) -> String {
        format!("postings:{}", self.company)
    }

    async fn fetch(
        &self,
        http: &BackoffClient,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawPosting>> {
        let url = format!("{}/{}", self.api_base, self.company);
        let response = http
            .get(&url, HeaderMap::new(), &[("mode", "json".to_string())])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::UnknownSource(format!(
                "company not found: {}",
                self.company
            )));
        }
        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                url,
            });
        }

        let data: Value = response.json().await?;
        let jobs = data.as_array().cloned().unwrap_or_default();

        let postings: Vec<RawPosting> =
            jobs.iter().filter_map(|j| self.to_canonical(j)).collect();

        if postings.len() < jobs.len() {
            debug!(
                "Postings {}: skipped {} records without a canonical URL",
                self.company,
                jobs.len() - postings.len()
            );
        }

        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RateLimiter;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> BackoffClient {
        BackoffClient::new(reqwest::Client::new(), RateLimiter::new(60_000.0))
            .with_backoff(0.01, 0.04)
    }

    #[test]
    fn test_first_location_shapes() {
        assert_eq!(
            first_location(&json!("Berlin")),
            Some("Berlin".to_string())
        );
        assert_eq!(
            first_location(&json!({ "name": "Berlin" })),
            Some("Berlin".to_string())
        );
        assert_eq!(
            first_location(&json!([{ "location": "Berlin" }, "Munich"])),
            Some("Berlin".to_string())
        );
        assert_eq!(first_location(&json!([null, "Munich"])), Some("Munich".to_string()));
        assert_eq!(first_location(&json!(null)), None);
    }

    #[tokio::test]
    async fn test_fetch_maps_postings() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme"))
            .and(query_param("mode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "hostedUrl": "https://jobs.example.com/acme/1",
                    "text": "Staff Engineer",
                    "categories": { "team": "Platform", "location": "NYC" },
                    "workplaceLocations": [{ "name": "Remote - EU" }],
                    "lists": [
                        { "text": "What you'll do" },
                        { "text": "Ship software" }
                    ],
                    "createdAt": 1709290800000i64,
                    "updatedAt": 1709377200000i64
                },
                { "text": "No URL, skipped" }
            ])))
            .mount(&server)
            .await;

        let source = PostingsSource::new("acme").with_api_base(server.uri());
        let postings = source.fetch(&http(), None).await.unwrap();

        assert_eq!(postings.len(), 1);
        let p = &postings[0];
        assert_eq!(p.org_name, "Platform");
        // workplaceLocations beats categories.location
        assert_eq!(p.location.as_deref(), Some("Remote - EU"));
        assert_eq!(p.description, "What you'll do\nShip software");
        // updatedAt (ms epoch) preferred
        assert_eq!(
            p.posted_at.unwrap().timestamp_millis(),
            1709377200000i64
        );
    }

    #[tokio::test]
    async fn test_location_falls_back_through_precedence() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "hostedUrl": "https://jobs.example.com/acme/2",
                    "text": "Analyst",
                    "country": "DE",
                    "descriptionPlain": "Crunch numbers"
                }
            ])))
            .mount(&server)
            .await;

        let source = PostingsSource::new("acme").with_api_base(server.uri());
        let postings = source.fetch(&http(), None).await.unwrap();

        assert_eq!(postings[0].location.as_deref(), Some("DE"));
        assert_eq!(postings[0].org_name, "acme");
        assert_eq!(postings[0].description, "Crunch numbers");
    }

    #[tokio::test]
    async fn test_unknown_company() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = PostingsSource::new("ghost").with_api_base(server.uri());
        let err = source.fetch(&http(), None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownSource(_)));
    }
}
