//! Search page iterator
//!
//! Drives the search endpoint with an increasing `start` offset and decides
//! when the result set is exhausted. Termination is signalled only by a page
//! whose `data` array is empty or entirely falsy; every transport or decode
//! failure is returned as an error so that a broken page is never mistaken
//! for the end of the results.

use crate::config::CrawlerConfig;
use crate::search::stub::{is_falsy, ResultStub};
use crate::search::{SearchQuery, PAGE_SIZE};
use crate::HarvestError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Outcome of one call to [`PageIterator::next_page`]
#[derive(Debug)]
pub enum PageResult {
    /// A non-terminal page
    Page(SearchPage),

    /// The endpoint has no more results
    End,
}

/// A decoded, non-terminal search page
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Zero-based page index
    pub index: u64,

    /// `start` offset the page was requested with
    pub offset: u64,

    /// Valid entries, in endpoint order
    pub stubs: Vec<ResultStub>,

    /// Entries that were dropped as unusable
    pub invalid_entries: usize,
}

/// Body shape of a search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<Value>,
}

/// Returns the `start` offset for page `index`
pub fn page_offset(index: u64) -> u64 {
    index * PAGE_SIZE
}

/// Decodes a search response body
///
/// # Returns
///
/// * `Ok(PageResult::End)` - `data` is empty or every element is falsy
/// * `Ok(PageResult::Page(..))` - at least one truthy element; index and offset are left at 0
/// * `Err(HarvestError::SearchDecode)` - body is not JSON or has no `data` array
pub fn decode_page(body: &str, url: &str) -> Result<PageResult, HarvestError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| HarvestError::SearchDecode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if response.data.iter().all(is_falsy) {
        return Ok(PageResult::End);
    }

    let mut stubs = Vec::with_capacity(response.data.len());
    let mut invalid_entries = 0;

    for (position, entry) in response.data.iter().enumerate() {
        match ResultStub::from_entry(entry) {
            Ok(stub) => stubs.push(stub),
            Err(reason) => {
                tracing::warn!("Skipping search entry {} from {}: {}", position, url, reason);
                invalid_entries += 1;
            }
        }
    }

    Ok(PageResult::Page(SearchPage {
        index: 0,
        offset: 0,
        stubs,
        invalid_entries,
    }))
}

/// Sequential iterator over the pages of one search query
pub struct PageIterator {
    client: Client,
    endpoint: String,
    query: SearchQuery,
    next_index: u64,
    exhausted: bool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PageIterator {
    /// Creates an iterator positioned at page 0
    pub fn new(client: Client, endpoint: &str, query: SearchQuery, config: &CrawlerConfig) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            query,
            next_index: 0,
            exhausted: false,
            max_retries: config.max_page_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Number of non-terminal pages returned so far
    pub fn pages_returned(&self) -> u64 {
        self.next_index
    }

    /// Returns true once `End` has been observed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches and decodes the next page
    ///
    /// After `End` has been returned, further calls return `End` again
    /// without contacting the endpoint.
    pub async fn next_page(&mut self) -> Result<PageResult, HarvestError> {
        if self.exhausted {
            return Ok(PageResult::End);
        }

        let index = self.next_index;
        let offset = page_offset(index);
        let body = self.fetch_body(offset).await?;

        match decode_page(&body, &self.endpoint)? {
            PageResult::End => {
                tracing::info!("No more results after {} page(s)", index);
                self.exhausted = true;
                Ok(PageResult::End)
            }
            PageResult::Page(mut page) => {
                page.index = index;
                page.offset = offset;
                self.next_index += 1;
                tracing::debug!(
                    "Search page {} (start={}): {} stub(s), {} invalid",
                    index,
                    offset,
                    page.stubs.len(),
                    page.invalid_entries
                );
                Ok(PageResult::Page(page))
            }
        }
    }

    /// Requests one search page, retrying transport failures and 5xx replies
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Transport error / timeout | Retry up to `max_retries` times |
    /// | HTTP 5xx | Retry up to `max_retries` times |
    /// | Other non-2xx | Fail immediately |
    ///
    /// The backoff doubles after every failed attempt.
    async fn fetch_body(&self, offset: u64) -> Result<String, HarvestError> {
        let params = self.query.params(offset);
        let mut backoff = self.retry_backoff;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let can_retry = attempt <= self.max_retries;

            let response = match self
                .client
                .get(&self.endpoint)
                .query(&params)
                .send()
                .await
            {
                Ok(response) => response,
                Err(source) => {
                    if can_retry {
                        tracing::warn!(
                            "Search request (start={}) failed on attempt {}: {}; retrying in {:?}",
                            offset,
                            attempt,
                            source,
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                        continue;
                    }
                    return Err(HarvestError::SearchTransport {
                        url: self.endpoint.clone(),
                        attempts: attempt,
                        source,
                    });
                }
            };

            let status = response.status();
            if status.is_server_error() && can_retry {
                tracing::warn!(
                    "Search request (start={}) returned HTTP {} on attempt {}; retrying in {:?}",
                    offset,
                    status.as_u16(),
                    attempt,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            if !status.is_success() {
                return Err(HarvestError::SearchStatus {
                    url: self.endpoint.clone(),
                    status: status.as_u16(),
                });
            }

            match response.text().await {
                Ok(body) => return Ok(body),
                Err(source) if can_retry => {
                    tracing::warn!(
                        "Reading search body (start={}) failed on attempt {}: {}",
                        offset,
                        attempt,
                        source
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(source) => {
                    return Err(HarvestError::SearchTransport {
                        url: self.endpoint.clone(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}
