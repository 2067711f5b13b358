use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::crawl::CrawlOptions;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Spider,
    Http,
}

/// Runtime settings: optional `egg_crawler.{toml,yaml,json}` overlaid by `EGG_*` variables.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub run_timeout_secs: Option<u64>,
    pub fetcher: FetcherKind,
    pub spider_api_key: Option<String>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/egg_prices.sqlite"),
            snapshot_dir: PathBuf::from("."),
            delay_ms: 2000,
            fetch_timeout_secs: 60,
            run_timeout_secs: None,
            fetcher: FetcherKind::Spider,
            spider_api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("egg_crawler").required(false))
                .add_source(Environment::with_prefix("EGG").try_parsing(true)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()?
            .try_deserialize()
            .context("Invalid crawler settings")
    }

    /// Configured key, falling back to the `SPIDER_API_KEY` variable.
    pub fn spider_api_key(&self) -> Option<String> {
        self.spider_api_key
            .clone()
            .or_else(|| std::env::var("SPIDER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            delay: Duration::from_millis(self.delay_ms),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            deadline: self
                .run_timeout_secs
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("db_path", &self.db_path)
            .field("snapshot_dir", &self.snapshot_dir)
            .field("delay_ms", &self.delay_ms)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .field("fetcher", &self.fetcher)
            .field("spider_api_key", &self.spider_api_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}
