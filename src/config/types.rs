use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for Review-Harvest, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Maximum number of requests in flight at once (`MAX_CONCURRENT_REQUESTS`)
    pub max_concurrent: usize,

    /// Lower bound of the randomized post-request delay in seconds (`REQUEST_DELAY_MIN`)
    pub delay_min: f64,

    /// Upper bound of the randomized post-request delay in seconds (`REQUEST_DELAY_MAX`)
    pub delay_max: f64,

    /// Default per-domain requests per minute (`RATE_LIMIT_RPM`)
    pub rate_limit_rpm: u32,

    /// Directory for exported review files (`OUTPUT_DIR`)
    pub output_dir: PathBuf,

    /// Per-request timeout in seconds (`REQUEST_TIMEOUT`)
    pub request_timeout: u64,

    /// Retries after the first attempt (`MAX_RETRIES`)
    pub max_retries: u32,

    /// Directory holding the per-source checkpoint databases (`CHECKPOINT_DIR`)
    pub checkpoint_dir: PathBuf,

    /// Number of reviews buffered before a checkpoint commit (`CHECKPOINT_BATCH_SIZE`)
    pub checkpoint_batch: usize,

    /// Minimum cleaned review length kept on export (`MIN_REVIEW_LENGTH`)
    pub min_review_length: usize,

    /// Maximum cleaned review length kept on export (`MAX_REVIEW_LENGTH`)
    pub max_review_length: usize,

    /// Static user agent sent with every request (`USER_AGENT`)
    pub user_agent: String,

    /// Path to the TOML source catalogue (`SOURCES_CONFIG`)
    pub sources_config: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            delay_min: 2.0,
            delay_max: 5.0,
            rate_limit_rpm: 20,
            output_dir: PathBuf::from("data/exports"),
            request_timeout: 30,
            max_retries: 3,
            checkpoint_dir: PathBuf::from("data/checkpoints"),
            checkpoint_batch: 100,
            min_review_length: 20,
            max_review_length: 10_000,
            user_agent: default_user_agent(),
            sources_config: PathBuf::from("config/sources.toml"),
        }
    }
}

impl Settings {
    /// Randomized delay bounds as durations
    pub fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs_f64(self.delay_min),
            Duration::from_secs_f64(self.delay_max),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Path of the checkpoint database for a source
    pub fn checkpoint_path(&self, source: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{}.db", source))
    }

    /// Default export path for a scrape of `source`
    pub fn default_output_path(&self, source: &str) -> PathBuf {
        self.output_dir.join(format!("{}_reviews.json", source))
    }

    /// Resolves the per-domain rate limit for a source
    ///
    /// An explicit `rate-limit-rpm` in the source catalogue wins. Otherwise the
    /// site's own default applies, capped by `RATE_LIMIT_RPM`.
    pub fn rate_limit_for(&self, site_default: u32, configured: Option<u32>) -> u32 {
        configured.unwrap_or_else(|| site_default.min(self.rate_limit_rpm))
    }
}

fn default_user_agent() -> String {
    format!("review-harvest/{}", env!("CARGO_PKG_VERSION"))
}

/// Source catalogue loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,
}

impl SourcesConfig {
    /// Looks up the entry for a source name
    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.get(name)
    }

    /// Iterates over enabled sources in name order
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.sources
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, entry)| (name.as_str(), entry))
    }
}

/// One source in the catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Whether `scrape` may use this entry's URLs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-domain requests per minute, overriding the site default
    #[serde(rename = "rate-limit-rpm")]
    pub rate_limit_rpm: Option<u32>,

    /// Whether pages must be rendered by an external browser
    #[serde(rename = "requires-browser", default)]
    pub requires_browser: bool,

    #[serde(default)]
    pub categories: Vec<SourceCategory>,
}

impl SourceEntry {
    /// All target URLs across categories, in declaration order
    pub fn all_urls(&self) -> Vec<&str> {
        self.categories
            .iter()
            .flat_map(|c| c.urls.iter().map(String::as_str))
            .collect()
    }
}

fn default_enabled() -> bool {
    true
}

/// A named group of target URLs (e.g. "electronics")
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCategory {
    pub name: String,

    #[serde(default)]
    pub urls: Vec<String>,
}
