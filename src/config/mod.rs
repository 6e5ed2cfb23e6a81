//! Configuration management for jobdex
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! The config file doubles as the source registry: which board tokens,
//! company slugs and paginated endpoints to fetch.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behavior (politeness, timeouts, pagination)
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Registered sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Requests per minute, per source
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: f64,

    /// User agent string sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Page size for paginated-search sources
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Hard cap on pages fetched per paginated source
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// The source registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Board tokens (board API)
    #[serde(default)]
    pub board_tokens: Vec<String>,

    /// Company slugs (postings API)
    #[serde(default)]
    pub postings_companies: Vec<String>,

    /// Paginated-search endpoint URLs
    #[serde(default)]
    pub paginated_endpoints: Vec<String>,
}

impl SourcesConfig {
    /// Total number of registered sources
    pub fn len(&self) -> usize {
        self.board_tokens.len() + self.postings_companies.len() + self.paginated_endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for jobdex data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,

    /// Path to the fetch checkpoint sidecar
    pub checkpoint_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            sources: SourcesConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: default_rate_per_minute(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl Config {
    /// Get the default base directory for jobdex (~/.jobdex)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".jobdex")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("jobs.db"),
            checkpoint_file: base.join("checkpoints.json"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("jobs.db"),
            checkpoint_file: base.join("checkpoints.json"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to
    /// defaults when no config file exists
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fetch.rate_per_minute <= 0.0 {
            return Err(Error::Config(
                "fetch.rate_per_minute must be positive".to_string(),
            ));
        }

        if self.fetch.page_limit == 0 {
            return Err(Error::Config("fetch.page_limit must be nonzero".to_string()));
        }

        if self.fetch.max_pages == 0 {
            return Err(Error::Config("fetch.max_pages must be nonzero".to_string()));
        }

        for endpoint in &self.sources.paginated_endpoints {
            url::Url::parse(endpoint).map_err(|e| {
                Error::Config(format!("Invalid paginated endpoint '{}': {}", endpoint, e))
            })?;
        }

        Ok(())
    }
}
