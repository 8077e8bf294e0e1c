use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use curbside_provider_san_jose::ScraperConfig;
use serde::Deserialize;
use tracing::{info, warn};

/// Settings read from `curbside.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub data: DataConfig,
    pub cache: CacheConfig,
    pub scraper: ScraperSection,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct DataConfig {
    pub baseline_dir: PathBuf,
    pub postal_table: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("data/state_baselines"),
            postal_table: PathBuf::from("data/postal/US.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct CacheConfig {
    pub database_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("curbside.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct ScraperSection {
    pub webdriver_url: String,
    pub timeout_secs: u64,
    pub keystroke_delay_ms: u64,
    pub headless: bool,
}

impl Default for ScraperSection {
    fn default() -> Self {
        let defaults = ScraperConfig::default();
        Self {
            webdriver_url: defaults.webdriver_url,
            timeout_secs: defaults.overall_timeout.as_secs(),
            keystroke_delay_ms: u64::try_from(defaults.keystroke_delay.as_millis()).unwrap_or(80),
            headless: defaults.headless,
        }
    }
}

impl ScraperSection {
    pub(crate) fn to_scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            overall_timeout: Duration::from_secs(self.timeout_secs),
            keystroke_delay: Duration::from_millis(self.keystroke_delay_ms),
            ..ScraperConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct MailConfig {
    pub from: String,
    pub api_key: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Curbside <schedules@curbside.local>".to_owned(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        let config = Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        if config.scraper.timeout_secs == 0 {
            anyhow::bail!("scraper.timeout_secs must be > 0");
        }
        Ok(config)
    }

    /// Resolve relative data and cache paths against `base`.
    pub(crate) fn rooted_at(mut self, base: &Path) -> Self {
        self.data.baseline_dir = base.join(&self.data.baseline_dir);
        self.data.postal_table = base.join(&self.data.postal_table);
        self.cache.database_path = base.join(&self.cache.database_path);
        self
    }
}
