//! Community leaderboard scraper.
//!
//! Pages of a community listing are fetched, parsed into [`Record`]s and merged into a
//! single JSON collection on disk. Every merge keeps per-community history: previous
//! counts, growth rates, engagement and how many times the community has been seen.

pub mod collection;
pub mod config;
mod error;
mod macros;
pub mod parse;
pub mod process;
pub mod record;
pub mod request;
pub mod store;

pub use collection::Collection;
pub use config::Config;
pub use error::{Error, ParseError, Result, StorageError};
pub use record::{Record, RecordMetadata, TrackedRecord};
pub use store::{Clock, MergeStore, SystemClock};

const BASE_URL: &str = "https://www.reddit.com";
const PAGES: usize = 50;
const START_PAGE: usize = 1;
const STORE_PATH: &str = "subreddits/subreddits.json";
const PAGE_DELAY_MS: u64 = 3_000;
const TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// Listing pages hold about this many communities.
const EXPECTED_ENTRIES_PER_PAGE: usize = 50;
