mod config;
mod crawler;
mod error;

pub mod detail;
pub mod html;
pub mod listing;
pub mod record;
pub mod sanitize;
pub mod store;

pub use config::{CrawlerConfig, OnError, MAX_DELAY};
pub use crawler::{
    CrawlReport, Crawler, HttpSource, ItemFailure, Listing, Outcome, PageSource,
};
pub use error::{Error, Result};
pub use listing::ItemList;
pub use record::{Attributes, Changes, Diff, Item, Record, DESCRIPTION};
pub use store::{Collection, Upsert};
