//! Build configuration loaded from YAML.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::{FeedFormat, HttpFetcher};
use crate::{Error, Result};

/// What to do when something fails during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log a warning and continue without the failed item.
    #[default]
    Skip,
    /// Stop the whole build with the error.
    Abort,
}

/// One feed to pull candidates from.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Name used in logs and metadata
    pub name: String,
    /// Remote location
    #[serde(default)]
    pub url: Option<String>,
    /// Local file
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Body format
    #[serde(default)]
    pub format: FeedFormat,
}

/// Configuration for a deny-list build.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Where the persisted list goes
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Download attempts after the first
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base delay between attempts (grows linearly)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Policy for feeds that cannot be fetched
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Policy for malformed lines inside a feed
    #[serde(default)]
    pub on_invalid_entry: FailurePolicy,
    /// Feeds to aggregate
    pub feeds: Vec<FeedConfig>,
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_timeout_secs() -> u64 {
    60
}

impl BuildConfig {
    /// Parse and validate YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: BuildConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// Relative feed paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml(&fs::read_to_string(path)?)?;
        if let Some(dir) = path.parent() {
            for feed in &mut config.feeds {
                if let Some(feed_path) = &feed.path {
                    if feed_path.is_relative() {
                        feed.path = Some(dir.join(feed_path));
                    }
                }
            }
        }
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(Error::Config("no feeds configured".to_string()));
        }
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(Error::Config("feed with empty name".to_string()));
            }
            match (&feed.url, &feed.path) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(Error::Config(format!(
                        "feed {} needs exactly one of url or path",
                        feed.name
                    )))
                }
            }
        }
        Ok(())
    }

    /// HTTP fetcher configured with this build's timeout and retry settings.
    pub fn fetcher(&self) -> HttpFetcher {
        HttpFetcher::new(
            Duration::from_secs(self.timeout_secs),
            self.retries,
            Duration::from_secs(self.retry_delay_secs),
        )
    }
}
