use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted pause between two items, in seconds.
pub const MAX_DELAY: f64 = 3600.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Lower bound in seconds of the random pause between two items
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,

    /// Upper bound in seconds of the random pause between two items
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,

    /// The crawl stops once the number of failed items exceeds this
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    #[serde(default = "default_on_item_error")]
    pub on_item_error: OnError,

    /// Where raw detail pages are archived, if anywhere
    #[serde(default)]
    pub html_dir: Option<PathBuf>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            user_agent: default_user_agent(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            max_errors: default_max_errors(),
            on_item_error: default_on_item_error(),
            html_dir: None,
        }
    }
}

impl CrawlerConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_yaml::from_reader(file)
            .map_err(|e| Error::Config(format!("{} got: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if [self.min_delay, self.max_delay]
            .iter()
            .any(|d| !(0.0..=MAX_DELAY).contains(d))
        {
            return Err(Error::Config(format!(
                "delays must be within 0..{MAX_DELAY} seconds, got {}..{}",
                self.min_delay, self.max_delay
            )));
        }
        if self.min_delay > self.max_delay {
            return Err(Error::Config(format!(
                "minDelay ({}) is greater than maxDelay ({})",
                self.min_delay, self.max_delay
            )));
        }
        url::Url::parse(&self.listing_url)
            .map_err(|e| Error::Config(format!("listingUrl {} got: {e}", self.listing_url)))?;
        Ok(())
    }
}

fn default_listing_url() -> String {
    String::from("https://audiogames.net/")
}

fn default_user_agent() -> String {
    String::from("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:77.0) Gecko/20100101 Firefox/77.0")
}

fn default_min_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    3.0
}

fn default_max_errors() -> usize {
    5
}

fn default_on_item_error() -> OnError {
    OnError::SkipAndLog
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum OnError {
    Fail,
    SkipAndLog,
}
