use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    builtin_date_defaults, default_category_rules, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, DEFAULT_FALLBACK_CATEGORY,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_VENUE_TIMEOUT_SECS, GENERIC_VENUE_CLASS,
};
use crate::error::{Result, ScraperError};
use crate::pipeline::category::{CategoryClassifier, CategoryRule};
use crate::pipeline::date_range::{VenueDefaults, MAX_DURATION_HOURS};
use crate::pipeline::venue::KnownVenue;
use crate::pipeline::PipelineSettings;
use crate::types::Venue;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    /// Overrides and additions to the built-in venue classes
    #[serde(default)]
    pub date_defaults: HashMap<String, VenueDefaults>,
    /// Replaces the built-in category table when non-empty
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub known_venues: Vec<KnownVenue>,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_venue_timeout_secs")]
    pub venue_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            venue_timeout_secs: DEFAULT_VENUE_TIMEOUT_SECS,
        }
    }
}

impl BatchConfig {
    pub fn venue_timeout(&self) -> Duration {
        Duration::from_secs(self.venue_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

/// Where a site's scraped fragments come from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON array of fragments on disk
    File { path: PathBuf },
    /// JSON array of fragments served over HTTP
    Http { url: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_venue_class")]
    pub venue_class: String,
    pub listing_url: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub context_tags: Vec<String>,
    #[serde(default)]
    pub title_prefix: Option<String>,
    pub default_venue: Venue,
    /// Consulted before the global table
    #[serde(default)]
    pub known_venues: Vec<KnownVenue>,
    pub source: SourceConfig,
}

fn default_fallback_category() -> String {
    DEFAULT_FALLBACK_CATEGORY.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_venue_timeout_secs() -> u64 {
    DEFAULT_VENUE_TIMEOUT_SECS
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/events.db")
}

fn default_venue_class() -> String {
    GENERIC_VENUE_CLASS.to_string()
}

impl Config {
    /// Load from `EVENT_PIPELINE_CONFIG`, or `config.toml` in the working directory
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(config_path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", config_path.display(), e))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.max_concurrency == 0 {
            return Err(ScraperError::Config("batch.max_concurrency must be at least 1".to_string()));
        }
        if self.fallback_category.trim().is_empty() {
            return Err(ScraperError::Config("fallback_category must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.id.trim().is_empty() {
                return Err(ScraperError::Config("site id must not be empty".to_string()));
            }
            if !seen.insert(site.id.as_str()) {
                return Err(ScraperError::Config(format!("duplicate site id '{}'", site.id)));
            }
            check_known_venues(&site.known_venues, &format!("site '{}'", site.id))?;
        }
        check_known_venues(&self.known_venues, "known_venues")?;

        for (class, defaults) in &self.date_defaults {
            if defaults.duration_hours == 0 || defaults.duration_hours > MAX_DURATION_HOURS {
                return Err(ScraperError::Config(format!(
                    "date_defaults.{class}.duration_hours must be between 1 and {MAX_DURATION_HOURS}, got {}",
                    defaults.duration_hours
                )));
            }
        }

        for rule in &self.categories {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ScraperError::Config(format!("category '{}' has no keywords", rule.name)));
            }
        }
        Ok(())
    }

    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.id == id)
    }

    /// Defaults for a venue class; unknown classes get the generic defaults
    pub fn date_defaults_for(&self, venue_class: &str) -> VenueDefaults {
        let class = venue_class.trim().to_lowercase();
        self.date_defaults
            .get(&class)
            .copied()
            .or_else(|| builtin_date_defaults().get(&class).copied())
            .or_else(|| self.date_defaults.get(GENERIC_VENUE_CLASS).copied())
            .unwrap_or_else(VenueDefaults::generic)
    }

    pub fn category_rules(&self) -> Vec<CategoryRule> {
        if self.categories.is_empty() {
            default_category_rules()
        } else {
            self.categories.clone()
        }
    }

    pub fn classifier(&self) -> CategoryClassifier {
        CategoryClassifier::new(&self.category_rules(), self.fallback_category.clone())
    }

    pub fn pipeline_settings(&self, site: &SiteConfig) -> PipelineSettings {
        let known_venues = site
            .known_venues
            .iter()
            .chain(self.known_venues.iter())
            .cloned()
            .collect();

        PipelineSettings {
            site_id: site.id.clone(),
            listing_url: site.listing_url.clone(),
            base_url: site.base_url.clone(),
            context_tags: site.context_tags.clone(),
            title_prefix: site.title_prefix.clone(),
            default_venue: site.default_venue.clone(),
            known_venues,
            date_defaults: self.date_defaults_for(&site.venue_class),
            classifier: self.classifier(),
        }
    }
}

fn check_known_venues(entries: &[KnownVenue], scope: &str) -> Result<()> {
    for entry in entries {
        if entry.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ScraperError::Config(format!(
                "{}: known venue '{}' has no keywords",
                scope, entry.venue.name
            )));
        }
    }
    Ok(())
}
