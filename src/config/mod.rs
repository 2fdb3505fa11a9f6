//! Configuration management for review-watch
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::ProblemTag;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listing-page crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Companies whose reviews are scraped
    #[serde(default = "default_companies")]
    pub companies: Vec<CompanyConfig>,

    /// Output file locations
    #[serde(default)]
    pub store: StoreConfig,

    /// Keyword table for problem tagging
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Recommendation ranking and templates
    #[serde(default)]
    pub recommend: RecommendConfig,

    /// Job scheduling
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Listing-page crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Portal base URL; company paths are joined onto it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum pause between two page fetches (milliseconds)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Maximum listing pages walked per company
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Skip TLS certificate validation. Accepts spoofed endpoints.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

/// A company whose review listing is crawled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfig {
    /// Identifier written to the `Company` column
    pub id: String,

    /// Listing path relative to `crawl.base_url`
    pub path: String,

    /// Overrides `crawl.max_pages` for this company
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

impl CompanyConfig {
    /// Effective page bound for this company given the crawl-wide bound
    pub fn page_limit(&self, default: u32) -> u32 {
        self.max_pages.unwrap_or(default)
    }
}

/// Output file locations; relative paths resolve against the base directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Review table reloaded on every run (CSV)
    #[serde(default = "default_table_file")]
    pub table_file: PathBuf,

    /// Report workbook rewritten by every analysis (XLSX)
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
}

/// Keyword stems for one problem tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemKeywords {
    pub tag: ProblemTag,
    pub stems: Vec<String>,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_problem_keywords")]
    pub problems: Vec<ProblemKeywords>,
}

/// Primary and secondary actions for a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub primary: String,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// Recommendation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Number of top-ranked problems to recommend on
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Poor-review count above which the general recommendation is added
    #[serde(default = "default_general_threshold")]
    pub general_threshold: usize,

    /// Templates keyed by problem tag (`payouts`, `timeliness`, ...)
    #[serde(default = "default_template_table")]
    pub templates: BTreeMap<String, ActionTemplate>,

    /// Template for the general improvement recommendation
    #[serde(default = "default_general_template")]
    pub general: ActionTemplate,
}

/// Job scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between the starts of two ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for review-watch data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

fn default_template_table() -> BTreeMap<String, ActionTemplate> {
    default_action_templates()
        .into_iter()
        .map(|(tag, template)| (tag.as_str().to_string(), template))
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            companies: default_companies(),
            store: StoreConfig::default(),
            classifier: ClassifierConfig::default(),
            recommend: RecommendConfig::default(),
            schedule: ScheduleConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            page_delay_ms: default_page_delay_ms(),
            max_pages: default_max_pages(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_file: default_table_file(),
            report_file: default_report_file(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            problems: default_problem_keywords(),
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            general_threshold: default_general_threshold(),
            templates: default_template_table(),
            general: default_general_template(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl RecommendConfig {
    /// Templates keyed by parsed problem tag
    pub fn resolved_templates(&self) -> Result<BTreeMap<ProblemTag, ActionTemplate>> {
        self.templates
            .iter()
            .map(|(key, template)| Ok((key.parse::<ProblemTag>()?, template.clone())))
            .collect()
    }
}

impl Config {
    /// Get the default base directory for review-watch (~/.review-watch)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".review-watch")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
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
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
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

    /// Check if review-watch is initialized (config exists)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists()
    }

    /// Resolve a configured file against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    pub fn table_path(&self) -> PathBuf {
        self.resolve(&self.store.table_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve(&self.store.report_file)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.crawl.base_url)
            .map_err(|e| Error::Config(format!("crawl.base_url is invalid: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(
                "crawl.base_url must be an absolute http(s) URL".to_string(),
            ));
        }

        if self.crawl.max_pages == 0 {
            return Err(Error::Config("crawl.max_pages must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for company in &self.companies {
            if company.id.trim().is_empty() {
                return Err(Error::Config("company id must not be empty".to_string()));
            }
            if !seen.insert(company.id.as_str()) {
                return Err(Error::Config(format!("duplicate company id: {}", company.id)));
            }
            if company.max_pages == Some(0) {
                return Err(Error::Config(format!(
                    "companies.{}.max_pages must be positive",
                    company.id
                )));
            }
        }

        for group in &self.classifier.problems {
            if group.stems.is_empty() || group.stems.iter().any(|s| s.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "classifier stems for '{}' must be non-empty",
                    group.tag
                )));
            }
        }

        if self.recommend.top_n == 0 {
            return Err(Error::Config("recommend.top_n must be positive".to_string()));
        }
        self.recommend.resolved_templates()?;

        if self.schedule.interval_secs == 0 {
            return Err(Error::Config(
                "schedule.interval_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
