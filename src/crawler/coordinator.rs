//! Harvest coordinator - main pipeline orchestration logic
//!
//! This module contains the main harvest loop that coordinates:
//! - Walking the search pages until the endpoint reports no more results
//! - Fetching, extracting and normalizing one record per stub
//! - Streaming every record into the store as soon as it is ready
//! - Pacing detail requests and honouring cancellation
//! - Recording the run and its counters

use crate::config::Config;
use crate::crawler::cancel::CancelSignal;
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{build_http_client, fetch_detail, FetchError};
use crate::crawler::normalizer::normalize;
use crate::search::{PageIterator, PageResult, ResultStub};
use crate::storage::{
    open_fresh_store, open_store, CrawlStats, InsertOutcome, Record, RecordStore, RunStatus,
};
use crate::HarvestError;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Main harvest coordinator structure
pub struct Coordinator<S: RecordStore> {
    config: Config,
    store: S,
    cancel: CancelSignal,
    client: Client,
    config_hash: String,
}

impl<S: RecordStore> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `store` - Where records and run rows are written
    /// * `cancel` - Flag polled before every page and detail fetch
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config, store: S, cancel: CancelSignal) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;

        Ok(Self {
            config,
            store,
            cancel,
            client,
            config_hash: String::new(),
        })
    }

    /// Sets the configuration hash recorded on the run row
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs the harvest until the search endpoint is exhausted
    ///
    /// The run row is always finished, with status `completed`, `cancelled`
    /// or `failed` and the counters gathered up to that point.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - The endpoint reported the end of its results
    /// * `Err(HarvestError::Cancelled)` - The cancel signal was tripped
    /// * `Err(HarvestError)` - A search or storage failure stopped the harvest
    pub async fn run(&mut self) -> Result<CrawlStats, HarvestError> {
        let run_id = self.store.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting harvest run {} (records keyed by {})",
            run_id,
            self.store.natural_key().columns().join(" + ")
        );

        let start_time = Instant::now();
        let mut stats = CrawlStats::default();
        let result = self.harvest(&mut stats).await;

        let status = match &result {
            Ok(()) => RunStatus::Completed,
            Err(HarvestError::Cancelled) => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        };

        if let Err(e) = self.store.finish_run(run_id, status, &stats) {
            tracing::error!("Failed to record end of run {}: {}", run_id, e);
            if result.is_ok() {
                return Err(e.into());
            }
        }

        tracing::info!(
            "Run {} {}: {} page(s), {} stub(s), {} inserted, {} duplicate(s), {} fetch failure(s), {} invalid entries in {:?}",
            run_id,
            status.to_db_string(),
            stats.pages,
            stats.stubs,
            stats.inserted,
            stats.duplicates,
            stats.fetch_failures,
            stats.invalid_entries,
            start_time.elapsed()
        );

        result.map(|()| stats)
    }

    /// Outer loop over search pages
    async fn harvest(&mut self, stats: &mut CrawlStats) -> Result<(), HarvestError> {
        let query = self.config.query()?;
        let mut pages = PageIterator::new(
            self.client.clone(),
            &self.config.search.url,
            query,
            &self.config.crawler,
        );

        loop {
            if self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested, stopping before next search page");
                return Err(HarvestError::Cancelled);
            }

            let page = match pages.next_page().await? {
                PageResult::Page(page) => page,
                PageResult::End => return Ok(()),
            };

            stats.pages += 1;
            stats.stubs += page.stubs.len() as u64;
            stats.invalid_entries += page.invalid_entries as u64;

            tracing::info!(
                "Search page {} (start={}): {} result(s)",
                page.index,
                page.offset,
                page.stubs.len()
            );

            if self.config.crawler.detail_workers > 1 {
                self.process_concurrent(page.stubs, stats).await?;
            } else {
                self.process_sequential(page.stubs, stats).await?;
            }
        }
    }

    /// Inner loop over the stubs of one page, one at a time
    async fn process_sequential(
        &mut self,
        stubs: Vec<ResultStub>,
        stats: &mut CrawlStats,
    ) -> Result<(), HarvestError> {
        let delay = self.detail_delay();

        for stub in stubs {
            if self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested, stopping before next detail page");
                return Err(HarvestError::Cancelled);
            }

            let outcome = harvest_stub(&self.client, stub).await;
            self.persist(outcome, stats)?;
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }

    /// Inner loop over the stubs of one page with a bounded worker pool
    ///
    /// Each worker holds its permit through fetch, extraction and the pacing
    /// sleep. Only this task writes to the store, so records are inserted one
    /// at a time in completion order.
    async fn process_concurrent(
        &mut self,
        stubs: Vec<ResultStub>,
        stats: &mut CrawlStats,
    ) -> Result<(), HarvestError> {
        let delay = self.detail_delay();
        let semaphore = Arc::new(Semaphore::new(self.config.crawler.detail_workers as usize));
        let mut tasks: JoinSet<Result<Record, FetchError>> = JoinSet::new();
        let mut cancelled = false;

        for stub in stubs {
            let permit = semaphore.clone().acquire_owned().await?;

            while let Some(joined) = tasks.try_join_next() {
                self.persist(joined?, stats)?;
            }

            if self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested, waiting for in-flight detail pages");
                cancelled = true;
                break;
            }

            let client = self.client.clone();
            tasks.spawn(async move {
                let outcome = harvest_stub(&client, stub).await;
                tokio::time::sleep(delay).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            self.persist(joined?, stats)?;
        }

        if cancelled {
            return Err(HarvestError::Cancelled);
        }

        Ok(())
    }

    /// Stores one finished record or accounts for its failure
    ///
    /// Fetch failures and duplicates are counted and logged; only a storage
    /// error is returned.
    fn persist(
        &mut self,
        outcome: Result<Record, FetchError>,
        stats: &mut CrawlStats,
    ) -> Result<(), HarvestError> {
        let record = match outcome {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping detail page: {}", e);
                stats.fetch_failures += 1;
                return Ok(());
            }
        };

        tracing::info!(
            "{} | {} | {} ratings | directors: {} | genres: {} | {} | {}",
            record.title,
            record
                .rating_score
                .map_or_else(|| "unrated".to_string(), |r| r.to_string()),
            record.rating_people_count,
            record.directors,
            record.genres,
            record.production_countries_regions,
            record.initial_release_date
        );

        let title = record.title.clone();
        match self.store.insert(record)? {
            InsertOutcome::Inserted => stats.inserted += 1,
            InsertOutcome::DuplicateKey => {
                tracing::info!("Already stored, skipping: {}", title);
                stats.duplicates += 1;
            }
        }

        Ok(())
    }

    fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.config.crawler.detail_delay_ms)
    }
}

/// Fetches, extracts and normalizes the record for one stub
async fn harvest_stub(client: &Client, stub: ResultStub) -> Result<Record, FetchError> {
    tracing::debug!("Fetching detail page for {}: {}", stub.title, stub.detail_url);

    let page = fetch_detail(client, &stub.detail_url).await?;
    if page.url != stub.detail_url {
        tracing::debug!("{} redirected to {}", stub.detail_url, page.url);
    }
    let fields = extract(&page.body);

    tracing::debug!(
        "Extracted {}/7 field(s) for {} from {}",
        fields.present_count(),
        stub.title,
        page.url
    );

    Ok(normalize(stub, &fields))
}

/// Runs a complete harvest against the configured SQLite store
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file, recorded on the run row
/// * `fresh` - Drop all stored records before starting
/// * `cancel` - Cancellation flag, usually tripped by Ctrl-C
///
/// # Example
///
/// ```no_run
/// use tagsweep::config::load_config_with_hash;
/// use tagsweep::crawler::{run_harvest, CancelSignal};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let stats = run_harvest(config, hash, false, CancelSignal::new()).await?;
/// println!("{} new record(s)", stats.inserted);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: String,
    fresh: bool,
    cancel: CancelSignal,
) -> Result<CrawlStats, HarvestError> {
    let path = Path::new(&config.output.database_path);
    let store = if fresh {
        tracing::info!("Dropping previously stored records");
        open_fresh_store(path, config.output.natural_key)?
    } else {
        open_store(path, config.output.natural_key)?
    };

    let mut coordinator = Coordinator::new(config, store, cancel)?.with_config_hash(config_hash);
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::storage::{NaturalKey, SqliteStore};

    fn create_test_config() -> Config {
        parse_config(
            r#"
[search]
url = "http://127.0.0.1:9/j/new_search_subjects"
tags = ["中国大陆", "电视剧"]
rating-range = [5.0, 10.0]
sort = "R"

[output]
database-path = "unused.db"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cancelled_before_start_records_cancelled_run() {
        let store = SqliteStore::open_in_memory(NaturalKey::TitleAndReleaseDate).unwrap();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let mut coordinator = Coordinator::new(create_test_config(), store, cancel)
            .unwrap()
            .with_config_hash("abc123");
        let result = coordinator.run().await;
        assert!(matches!(result, Err(HarvestError::Cancelled)));

        let run = coordinator.store().get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.config_hash, "abc123");
        assert_eq!(run.stats, CrawlStats::default());
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_persist_counts_outcomes() {
        let store = SqliteStore::open_in_memory(NaturalKey::Title).unwrap();
        let mut coordinator =
            Coordinator::new(create_test_config(), store, CancelSignal::new()).unwrap();
        let mut stats = CrawlStats::default();

        let stub = ResultStub {
            title: "人世间".to_string(),
            rating_score: Some(8.2),
            detail_url: "https://movie.test/subject/1/".to_string(),
        };
        let record = normalize(stub, &Default::default());

        coordinator.persist(Ok(record.clone()), &mut stats).unwrap();
        coordinator.persist(Ok(record), &mut stats).unwrap();
        coordinator
            .persist(
                Err(FetchError::Status {
                    url: "https://movie.test/subject/2/".to_string(),
                    status: 404,
                }),
                &mut stats,
            )
            .unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(coordinator.into_store().count_records().unwrap(), 1);
    }
}
