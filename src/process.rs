use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::parse::{parse_listing, Extractor};
use crate::record::Record;
use crate::request::{Fetcher, PageSource};
use crate::store::{Clock, MergeStore};
use crate::{info_time, Config, Error, ParseError, Result};

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages (or about documents) fetched and parsed.
    pub pages: usize,
    /// Pages that couldn't be fetched and were skipped.
    pub failed_pages: usize,
    /// Records handed to the store.
    pub observed: usize,
    /// Malformed items dropped during extraction.
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    /// Size of the collection once the run finished.
    pub total: usize,
    /// Page with no communities on it that ended the crawl before `pages` ran out.
    pub stopped_early: Option<usize>,
}

#[derive(Debug, Default)]
struct WriteStats {
    created: usize,
    updated: usize,
    total: usize,
}

/// Runs whatever `config` asks for: a refresh of named communities, or a listing crawl.
pub async fn process_site(config: Config) -> Result<CrawlSummary> {
    let start_time = Local::now();
    let fetcher = Fetcher::new(config.clone())?;
    let store = MergeStore::new(config.store_path.clone());

    let summary = if config.refresh.is_empty() {
        crawl(&fetcher, store, &config).await?
    } else {
        refresh(&fetcher, store, &config).await?
    };

    info_time!(
        start_time,
        "Finished: {} new, {} updated, {} tracked in {}",
        summary.created,
        summary.updated,
        summary.total,
        config.store_path.display()
    );
    Ok(summary)
}

/// Crawls `config.pages` listing pages starting at `config.start_page`.
/// Stops early at the first page that has no communities on it.
pub async fn crawl<S, C>(source: &S, store: MergeStore<C>, config: &Config) -> Result<CrawlSummary>
where
    S: PageSource,
    C: Clock + 'static,
{
    info_time!("Started crawling {} pages", config.pages);
    let extractor = Arc::new(Extractor::new()?);

    run_with_writer(store, |batch_tx| async move {
        let mut summary = CrawlSummary::default();
        let first = config.start_page;

        for page in (first..).take(config.pages) {
            if page > first {
                sleep(config.page_delay).await;
            }

            let start_page_time = Local::now();
            let html = match source.listing_page(page).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(page, "couldn't fetch page: {e}");
                    summary.failed_pages += 1;
                    continue;
                }
            };

            let items = parse_listing(extractor.clone(), html, page).await?;
            if items.is_empty() {
                warn!(page, "found EMPTY page, stopping the crawl");
                summary.stopped_early = Some(page);
                break;
            }

            let (batch, skipped) = split_items(items);
            summary.pages += 1;
            summary.observed += batch.len();
            summary.skipped += skipped;

            batch_tx.send(batch).await?;
            info_time!(start_page_time, "Processed page {}", page);
        }
        Ok::<_, Error>(summary)
    })
    .await
}

/// Refreshes each community in `config.refresh` from its about document.
pub async fn refresh<S, C>(
    source: &S,
    store: MergeStore<C>,
    config: &Config,
) -> Result<CrawlSummary>
where
    S: PageSource,
    C: Clock + 'static,
{
    info_time!("Started refreshing {} communities", config.refresh.len());
    let extractor = Extractor::new()?;

    run_with_writer(store, |batch_tx| async move {
        let mut summary = CrawlSummary::default();

        for (i, name) in config.refresh.iter().enumerate() {
            if i > 0 {
                sleep(config.page_delay).await;
            }

            let json = match source.about(name).await {
                Ok(json) => json,
                Err(e) => {
                    warn!(name = %name, "couldn't fetch about document: {e}");
                    summary.failed_pages += 1;
                    continue;
                }
            };
            summary.pages += 1;

            match extractor.extract_about(&json, Utc::now()) {
                Ok(record) => {
                    summary.observed += 1;
                    batch_tx.send(vec![record]).await?;
                }
                Err(e) => {
                    warn!(name = %name, "skipping community: {e}");
                    summary.skipped += 1;
                }
            }
        }
        Ok::<_, Error>(summary)
    })
    .await
}

/// Spawns the single writer that owns `store`, runs `feed` against its channel and
/// merges both results. A storage failure in the writer wins over the feed's own error,
/// since the feed only sees the closed channel.
async fn run_with_writer<C, F, Fut>(store: MergeStore<C>, feed: F) -> Result<CrawlSummary>
where
    C: Clock + 'static,
    F: FnOnce(mpsc::Sender<Vec<Record>>) -> Fut,
    Fut: std::future::Future<Output = Result<CrawlSummary>>,
{
    let (batch_tx, batch_rx) = mpsc::channel(8);
    let writer = tokio::spawn(write_batches(store, batch_rx));

    let fed = feed(batch_tx).await;
    let written = writer.await??;
    let mut summary = fed?;

    summary.created = written.created;
    summary.updated = written.updated;
    summary.total = written.total;
    Ok(summary)
}

/// Applies batches one at a time, in the order they were sent.
async fn write_batches<C: Clock>(
    mut store: MergeStore<C>,
    mut batch_rx: mpsc::Receiver<Vec<Record>>,
) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    while let Some(batch) = batch_rx.recv().await {
        let merged = store.update_with_summary(batch).await?;
        stats.created += merged.created;
        stats.updated += merged.updated;
    }
    stats.total = store.load().await?.len();
    Ok(stats)
}

fn split_items(items: Vec<std::result::Result<Record, ParseError>>) -> (Vec<Record>, usize) {
    let mut skipped = 0;
    let batch = items
        .into_iter()
        .filter_map(|item| match item {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("dropped item: {e}");
                skipped += 1;
                None
            }
        })
        .collect();
    (batch, skipped)
}
