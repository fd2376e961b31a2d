use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use url::Url;

use crate::config::{CrawlerConfig, OnError};
use crate::detail;
use crate::error::{Error, Result};
use crate::listing::{self, ItemList};
use crate::record::{Item, Record};
use crate::sanitize::secure_filename;
use crate::store::{Collection, Upsert};

/// Where pages come from.
#[async_trait]
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET, identified by the configured user agent.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Config(format!("Couldn't build HTTP client got: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let transport = |e: reqwest::Error| Error::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport)?
            .text()
            .await
            .map_err(transport)
    }
}

/// Where the listing page is read from.
#[derive(Debug, Clone)]
pub enum Listing {
    /// Fetched from the configured listing URL
    Remote,
    /// Read from disk, links still resolved against the listing URL
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Stopped because too many items failed
    CircuitBroken,
    /// Stopped on user interrupt
    Cancelled,
    /// Stopped on the first failure with `OnError::Fail`
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub listed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<ItemFailure>,
    pub outcome: Outcome,
}

impl CrawlReport {
    fn new(listed: usize) -> Self {
        Self {
            listed,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            failures: vec![],
            outcome: Outcome::Completed,
        }
    }

    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.failures.len()
    }

    fn count(&mut self, upsert: Upsert) {
        match upsert {
            Upsert::Inserted => self.inserted += 1,
            Upsert::Updated => self.updated += 1,
            Upsert::Unchanged => self.unchanged += 1,
        }
    }

    fn log(&self) {
        log::info!(
            "{:?} after {}/{} items: {} added, {} updated, {} unchanged, {} failed",
            self.outcome,
            self.processed(),
            self.listed,
            self.inserted,
            self.updated,
            self.unchanged,
            self.failures.len(),
        );
        for ItemFailure { id, reason } in &self.failures {
            log::info!("  {id}: {reason}");
        }
    }
}

/// Sequential crawl of the listing, one item at a time.
pub struct Crawler<S> {
    config: CrawlerConfig,
    source: S,
    stop: Arc<AtomicBool>,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(config: CrawlerConfig, source: S) -> Self {
        Self {
            config,
            source,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Setting this flag stops the crawl before the next item.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn listing_url(&self) -> Result<Url> {
        Url::parse(&self.config.listing_url)
            .map_err(|e| Error::Config(format!("listingUrl {} got: {e}", self.config.listing_url)))
    }

    pub async fn list_items(&self) -> Result<ItemList> {
        let page_url = self.listing_url()?;
        let page = self.source.fetch(page_url.as_str()).await?;
        listing::parse(&page, &page_url)
    }

    pub fn list_items_from_file<P: AsRef<Path>>(&self, path: P) -> Result<ItemList> {
        let page = fs::read_to_string(path.as_ref()).map_err(|e| Error::io(path.as_ref(), e))?;
        listing::parse(&page, &self.listing_url()?)
    }

    /// Fetches, archives and parses the detail page of `item`.
    pub async fn fetch_record(&self, item: &Item) -> Result<Record> {
        let page = self.source.fetch(item.db_url()).await?;
        if let Some(dir) = &self.config.html_dir {
            archive_page(dir, item.id(), &page)?;
        }
        let attributes = detail::parse(&page)?;
        Ok(item.to_record(attributes))
    }

    async fn process(&self, item: &Item, collection: &mut Collection) -> Result<Upsert> {
        let record = self.fetch_record(item).await?;
        let diff = record.diff(collection.find(item.id()));
        let upsert = collection.upsert(diff);
        match upsert {
            Upsert::Inserted => log::info!("Adding {} to database", item.id()),
            Upsert::Updated => log::info!("Updating {} in database", item.id()),
            Upsert::Unchanged => log::debug!("{} is up to date", item.id()),
        }
        Ok(upsert)
    }

    async fn pause(&self) {
        let max = self.config.max_delay;
        if !max.is_finite() || max <= 0.0 {
            return;
        }
        let min = match self.config.min_delay {
            min if min.is_finite() => min.clamp(0.0, max),
            _ => 0.0,
        };
        let secs = rand::thread_rng().gen_range(min..=max);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => tokio::time::sleep(delay).await,
            Err(e) => log::warn!("Skipping pause of {secs}s got: {e}"),
        }
    }

    /// Processes every item in listing order, merging results into `collection`.
    ///
    /// Item failures never escape: they are logged, counted and the crawl moves
    /// on, until there are more than `max_errors` of them.
    pub async fn crawl(&self, items: &ItemList, collection: &mut Collection) -> CrawlReport {
        let mut report = CrawlReport::new(items.len());

        for (n, item) in items.iter().enumerate() {
            if n > 0 {
                self.pause().await;
            }
            if self.stop.load(Ordering::SeqCst) {
                log::warn!("Interrupted, {} items left", items.len() - n);
                report.outcome = Outcome::Cancelled;
                break;
            }

            log::debug!("Retrieving {}", item.id());
            match self.process(item, collection).await {
                Ok(upsert) => report.count(upsert),
                Err(e) => {
                    log::error!("Skipping {} got: {e}", item.id());
                    report.failures.push(ItemFailure {
                        id: item.id().to_string(),
                        reason: e.to_string(),
                    });
                    match self.config.on_item_error {
                        OnError::Fail => {
                            report.outcome = Outcome::Aborted;
                            break;
                        }
                        OnError::SkipAndLog => {
                            let errors = report.failures.len();
                            log::warn!("Error #{errors}");
                            if errors > self.config.max_errors {
                                log::warn!("Error limit reached, postponing further download");
                                report.outcome = Outcome::CircuitBroken;
                                break;
                            }
                        }
                    }
                }
            }
        }

        report
    }

    /// Whole run: load the snapshot, list, crawl then save.
    ///
    /// The snapshot is saved whatever the crawl outcome. Failing to load it
    /// or to list the items aborts before anything is fetched or written.
    pub async fn run<P: AsRef<Path>>(&self, listing: &Listing, snapshot: P) -> Result<CrawlReport> {
        let snapshot = snapshot.as_ref();
        let mut collection = Collection::open(snapshot)?;

        let items = match listing {
            Listing::Remote => self.list_items().await?,
            Listing::File(path) => self.list_items_from_file(path)?,
        };
        log::info!("{} games in database", items.len());

        let report = self.crawl(&items, &mut collection).await;
        collection.save(snapshot)?;
        report.log();

        Ok(report)
    }
}

fn archive_page(dir: &Path, id: &str, page: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(format!("{}.html", secure_filename(id)));
    fs::write(&path, page).map_err(|e| Error::io(path, e))
}
