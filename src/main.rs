use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agdb::{Crawler, CrawlerConfig, HttpSource, Listing, OnError, Outcome};
use clap::Parser;
use tokio::runtime;

/// Mirror the audiogames.net game database into a JSON snapshot
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Path to the JSON snapshot, created if absent
    pub snapshot: PathBuf,
    /// Optional crawler yaml configuration file
    #[arg(env = "AGDB_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override the URL of the page listing every game
    #[arg(long)]
    pub listing_url: Option<String>,
    /// Read the listing from a local html file instead of downloading it
    #[arg(long)]
    pub listing_file: Option<PathBuf>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override the minimum pause between two games, in seconds
    #[arg(long)]
    pub min_delay: Option<f64>,
    /// Override the maximum pause between two games, in seconds
    #[arg(long)]
    pub max_delay: Option<f64>,
    /// Override how many failed games are tolerated before stopping
    #[arg(long)]
    pub max_errors: Option<usize>,
    /// Override the failed game handling strategy
    #[arg(value_enum, long)]
    pub on_item_error: Option<OnError>,
    /// Directory where raw game pages are archived
    #[arg(long)]
    pub html_dir: Option<PathBuf>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&Args> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut conf = match &args.crawler_config {
            Some(path) => CrawlerConfig::from_yaml_file(path)?,
            None => CrawlerConfig::default(),
        };
        if let Some(listing_url) = &args.listing_url {
            conf.listing_url = listing_url.to_string();
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(min_delay) = args.min_delay {
            conf.min_delay = min_delay;
        }
        if let Some(max_delay) = args.max_delay {
            conf.max_delay = max_delay;
        }
        if let Some(max_errors) = args.max_errors {
            conf.max_errors = max_errors;
        }
        if let Some(on_item_error) = args.on_item_error {
            conf.on_item_error = on_item_error;
        }
        if let Some(html_dir) = &args.html_dir {
            conf.html_dir = Some(html_dir.clone());
        }
        conf.validate()?;
        Ok(conf)
    }
}

/// Raises the stop flag, false when it was already raised.
fn request_stop(stop: &AtomicBool) -> bool {
    !stop.swap(true, Ordering::SeqCst)
}

/// Every ^C stops the crawl before the next game, the snapshot is still saved.
fn watch_interrupt(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if request_stop(&stop) {
                log::warn!("Interrupted, stopping after the current game");
            } else {
                log::warn!("Already stopping, waiting for the current game then saving");
            }
        }
    });
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("agdb=info"))
            .init();
    }

    let config = CrawlerConfig::try_from(&args)?;
    let listing = match args.listing_file {
        Some(path) => Listing::File(path),
        None => Listing::Remote,
    };
    let crawler = Crawler::new(config.clone(), HttpSource::new(&config)?);

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    let report = rt.block_on(async {
        watch_interrupt(crawler.stop_flag());
        crawler.run(&listing, &args.snapshot).await
    })?;

    match report.outcome {
        Outcome::Completed | Outcome::Cancelled => Ok(()),
        Outcome::CircuitBroken => anyhow::bail!(
            "Stopped after {} failed games, snapshot saved",
            report.failures.len()
        ),
        Outcome::Aborted => anyhow::bail!("Stopped on first failed game, snapshot saved"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "agdb",
            "games.json",
            "--max-errors",
            "2",
            "--min-delay",
            "0",
            "--max-delay",
            "0.5",
            "--on-item-error",
            "fail",
        ]);
        let conf = CrawlerConfig::try_from(&args).unwrap();
        assert_eq!(args.snapshot, PathBuf::from("games.json"));
        assert_eq!(conf.max_errors, 2);
        assert_eq!(conf.max_delay, 0.5);
        assert_eq!(conf.on_item_error, OnError::Fail);
        assert_eq!(conf.listing_url, "https://audiogames.net/");
    }

    #[test]
    fn inconsistent_delays_are_rejected() {
        let args = Args::parse_from(["agdb", "games.json", "--min-delay", "5"]);
        assert!(CrawlerConfig::try_from(&args).is_err());
    }

    #[test]
    fn repeated_interrupts_only_raise_the_flag() {
        let stop = AtomicBool::new(false);
        assert!(request_stop(&stop));
        assert!(!request_stop(&stop));
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn snapshot_is_required() {
        assert!(Args::try_parse_from(["agdb"]).is_err());
    }
}
