//! Fetch session orchestration
//!
//! A session drives every selected source through the same pass: load the
//! prior checkpoint, fetch through a source-scoped rate limiter and backoff
//! client, normalize and upsert each record, then advance the checkpoint.
//! Sources run as independent concurrent tasks and never throttle each
//! other; requests within one source stay sequential because pagination
//! and conditional fetch depend on prior response state.

mod backoff;
mod checkpoint;
mod rate_limit;

pub use backoff::*;
pub use checkpoint::*;
pub use rate_limit::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::sources::{BoardSource, JobSource, PaginatedSource, PostingsSource};
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

/// Options for one fetch invocation
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Restrict the run to these source labels
    pub source_labels: Option<Vec<String>>,
    /// Override the configured request rate
    pub rate_per_minute: Option<f64>,
}

/// Statistics from a fetch session
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub records_seen: usize,
    pub records_upserted: usize,
    pub records_skipped: usize,
}

struct SourceOutcome {
    label: String,
    fetched_at: DateTime<Utc>,
    seen: usize,
    upserted: usize,
    skipped: usize,
}

/// One ingestion pass over the configured sources
pub struct FetchSession {
    config: Config,
    store: JobStore,
    checkpoints: CheckpointStore,
}

impl FetchSession {
    pub fn new(config: Config, store: JobStore) -> Self {
        let checkpoints = CheckpointStore::new(&config.paths.checkpoint_file);
        Self {
            config,
            store,
            checkpoints,
        }
    }

    /// Build the adapter set from the source registry
    pub fn build_sources(config: &Config) -> Result<Vec<Box<dyn JobSource>>> {
        let mut sources: Vec<Box<dyn JobSource>> = Vec::new();

        for token in &config.sources.board_tokens {
            let token = token.trim();
            if !token.is_empty() {
                sources.push(Box::new(BoardSource::new(token)));
            }
        }

        for company in &config.sources.postings_companies {
            let company = company.trim();
            if !company.is_empty() {
                sources.push(Box::new(PostingsSource::new(company)));
            }
        }

        for endpoint in &config.sources.paginated_endpoints {
            let endpoint = endpoint.trim();
            if endpoint.is_empty() {
                continue;
            }
            let url = Url::parse(endpoint).map_err(|e| {
                Error::Config(format!("Invalid paginated endpoint '{}': {}", endpoint, e))
            })?;
            sources.push(Box::new(PaginatedSource::new(
                url,
                config.fetch.page_limit,
                config.fetch.max_pages,
            )));
        }

        Ok(sources)
    }

    /// Run a session over the configured sources
    pub async fn run(&self, options: FetchOptions) -> Result<FetchStats> {
        let mut sources = Self::build_sources(&self.config)?;

        if let Some(labels) = &options.source_labels {
            sources.retain(|s| labels.contains(&s.label()));
        }
        if sources.is_empty() {
            return Err(Error::Config(
                "no sources selected; register sources in config.toml".to_string(),
            ));
        }

        let rate = options
            .rate_per_minute
            .unwrap_or(self.config.fetch.rate_per_minute);

        self.run_sources(sources, rate).await
    }

    /// Run a session over an explicit adapter set
    pub async fn run_sources(
        &self,
        sources: Vec<Box<dyn JobSource>>,
        rate_per_minute: f64,
    ) -> Result<FetchStats> {
        let client = Client::builder()
            .user_agent(&self.config.fetch.user_agent)
            .timeout(Duration::from_secs(self.config.fetch.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let mut checkpoints = self.checkpoints.load();

        let tasks = sources.iter().map(|source| {
            let since = checkpoints.get(&source.label()).map(|c| c.last_fetch);
            let http = BackoffClient::new(
                client.clone(),
                RateLimiter::new(rate_per_minute),
            );
            self.fetch_one(source.as_ref(), http, since)
        });

        let outcomes = futures::future::join_all(tasks).await;

        let mut stats = FetchStats::default();
        for outcome in outcomes {
            match outcome {
                Ok(o) => {
                    stats.sources_ok += 1;
                    stats.records_seen += o.seen;
                    stats.records_upserted += o.upserted;
                    stats.records_skipped += o.skipped;
                    checkpoints.insert(
                        o.label,
                        Checkpoint {
                            last_fetch: o.fetched_at,
                        },
                    );
                }
                Err(_) => stats.sources_failed += 1,
            }
        }

        // Best-effort advance: a failed save only costs a re-fetch next run
        if let Err(e) = self.checkpoints.save(&checkpoints) {
            warn!("Failed to save checkpoints: {}", e);
        }

        Ok(stats)
    }

    /// Fetch and persist one source; failures are reported, not propagated
    /// to sibling sources
    async fn fetch_one(
        &self,
        source: &dyn JobSource,
        http: BackoffClient,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<SourceOutcome, ()> {
        let label = source.label();
        // Checkpoint from the start of the pass: anything published while
        // we fetch is re-examined next session
        let fetched_at = Utc::now();

        let raws = match source.fetch(&http, since).await {
            Ok(raws) => raws,
            Err(e) => {
                error!("Source {} failed: {}", label, e);
                return Err(());
            }
        };

        let mut outcome = SourceOutcome {
            label: label.clone(),
            fetched_at,
            seen: raws.len(),
            upserted: 0,
            skipped: 0,
        };

        for raw in &raws {
            let derived = normalize(&raw.title, &raw.description, raw.location.as_deref());
            match self.store.upsert(raw, &derived).await {
                Ok(()) => outcome.upserted += 1,
                Err(e) => {
                    // One bad record never aborts the batch
                    warn!("Skipping record {} from {}: {}", raw.url, label, e);
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            "Source {}: {} fetched, {} upserted, {} skipped",
            label, outcome.seen, outcome.upserted, outcome.skipped
        );
        Ok(outcome)
    }
}
