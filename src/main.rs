//! jobdex CLI entry point

use clap::{Parser, Subcommand};
use jobdex::{
    config::Config,
    error::{Error, Result},
    fetch::{CheckpointStore, FetchOptions, FetchSession, FetchStats},
    search::{SearchEngine, SearchHit},
    store::JobStore,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jobdex")]
#[command(version, about = "Aggregate job postings into a local searchable index", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize jobdex configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Fetch postings from the configured sources
    Fetch {
        /// Only fetch these source labels (e.g. board:acme)
        #[arg(long)]
        source: Option<Vec<String>>,

        /// Requests per minute, overriding the configured rate
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Query the local index
    Query {
        /// The search text
        query: String,

        /// Exact location filter
        #[arg(long)]
        loc: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show index status
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init doesn't need an existing config
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force);
    }

    let config = load_config(cli.config.as_deref())?;
    let store = JobStore::open(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Fetch { source, rate } => {
            let session = FetchSession::new(config, store);
            let options = FetchOptions {
                source_labels: source,
                rate_per_minute: rate,
            };

            // Partial failures are reported above; only configuration
            // errors make the invocation exit non-zero
            let stats = session.run(options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_fetch_stats(&stats);
            }
        }

        Commands::Query { query, loc, limit } => {
            let engine = SearchEngine::new(&store);
            let hits = engine.search(&query, loc.as_deref(), limit).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_query_results(&hits);
            }
        }

        Commands::Status => {
            let status = build_status(&config, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}

fn handle_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let (base_dir, config_file) = if let Some(path) = config_path {
        let base = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir);
        let file = if path.extension().is_some_and(|e| e == "toml") {
            path
        } else {
            path.join("config.toml")
        };
        (base, file)
    } else {
        let base = Config::default_base_dir();
        (base.clone(), base.join("config.toml"))
    };

    if config_file.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            config_file.display()
        );
        std::process::exit(1);
    }

    let mut config = Config::default();
    config.paths.base_dir = base_dir.clone();
    config.paths.config_file = config_file.clone();
    config.paths.db_file = base_dir.join("jobs.db");
    config.paths.checkpoint_file = base_dir.join("checkpoints.json");
    config.save()?;

    println!("✓ jobdex initialized successfully");
    println!("  Config: {}", config_file.display());
    println!("\nNext steps:");
    println!("  1. Register sources in the config file ([sources] section)");
    println!("  2. Fetch postings: jobdex fetch");
    println!("  3. Search: jobdex query \"backend engineer\"");

    Ok(())
}

fn print_fetch_stats(stats: &FetchStats) {
    println!("\n✓ Fetch complete");
    println!("  Sources ok: {}", stats.sources_ok);
    println!("  Sources failed: {}", stats.sources_failed);
    println!("  Records fetched: {}", stats.records_seen);
    println!("  Records upserted: {}", stats.records_upserted);
    println!("  Records skipped: {}", stats.records_skipped);
}

fn print_query_results(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("(no results)");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{:>2}. {} — {}", i + 1, hit.title, hit.org_name);
        if let Some(location) = &hit.location {
            println!("    {}", location);
        }
        if let Some(posted_at) = &hit.posted_at {
            println!("    posted {}", posted_at);
        }
        println!("    {}\n", hit.post_url);
    }
}

#[derive(Debug, Serialize)]
struct Status {
    total_postings: i64,
    fts_enabled: bool,
    sources: Vec<SourceStatus>,
}

#[derive(Debug, Serialize)]
struct SourceStatus {
    source_id: String,
    postings: i64,
    last_fetch: Option<String>,
}

async fn build_status(config: &Config, store: &JobStore) -> Result<Status> {
    let checkpoints = CheckpointStore::new(&config.paths.checkpoint_file).load();

    let sources = store
        .counts_by_source()
        .await?
        .into_iter()
        .map(|(source_id, postings)| {
            let last_fetch = checkpoints
                .get(&source_id)
                .map(|c| c.last_fetch.to_rfc3339());
            SourceStatus {
                source_id,
                postings,
                last_fetch,
            }
        })
        .collect();

    Ok(Status {
        total_postings: store.count().await?,
        fts_enabled: store.fts_enabled(),
        sources,
    })
}

fn print_status(status: &Status) {
    println!("jobdex status:");
    println!("  Postings: {}", status.total_postings);
    println!(
        "  Search: {}",
        if status.fts_enabled {
            "full-text"
        } else {
            "substring (degraded)"
        }
    );
    for source in &status.sources {
        println!(
            "  {} — {} postings, last fetch {}",
            source.source_id,
            source.postings,
            source.last_fetch.as_deref().unwrap_or("never")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_reports_uninitialized() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("config.toml");

        let err = load_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        assert!(err.to_string().contains("jobdex init"));
    }

    #[test]
    fn test_existing_config_loads() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.config_file = tmp.path().join("config.toml");
        config.save().unwrap();

        let loaded = load_config(Some(&config.paths.config_file)).unwrap();
        assert!(loaded.validate().is_ok());
    }
}
