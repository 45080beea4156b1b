//! Paginated, paced access to the Organizations list calls.
//!
//! A [`CursorChain`] carries the continuation token together with the instant
//! the previous page of the same chain was requested, so spacing can always be
//! enforced when a token is present. The [`ThrottleBackoff`] is owned by the
//! fetcher and shared by every chain it serves for the lifetime of the run.

use crate::client::{ListOperation, OrganizationsClient, PageRequest};
use crate::config::{InventoryConfig, PacingConfig};
use crate::error::InventoryResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Doubling delay applied on throttling responses. It never shrinks or resets.
#[derive(Debug, Clone)]
pub struct ThrottleBackoff {
    initial: Duration,
    current: Duration,
    retries: u32
}

impl ThrottleBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: initial,
            retries: 0
        }
    }

    /// Delay to sleep for this retry; the next one will be twice as long.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2);
        self.retries += 1;
        delay
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Pagination state of one logical listing.
#[derive(Debug, Default)]
pub struct CursorChain {
    next_token: Option<String>,
    last_call: Option<Instant>,
    pages: u32,
    exhausted: bool
}

impl CursorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub api_calls: u64,
    pub throttled_retries: u64,
    pub soft_errors: u64
}

pub struct PaginatedFetcher {
    client: Arc<dyn OrganizationsClient>,
    page_size: i32,
    min_call_interval: Duration,
    soft_error_pause: Duration,
    backoff: ThrottleBackoff,
    stats: FetchStats
}

impl PaginatedFetcher {
    pub fn new(client: Arc<dyn OrganizationsClient>, config: &InventoryConfig) -> Self {
        Self::with_pacing(client, config.page_size, &config.pacing)
    }

    pub fn with_pacing(
        client: Arc<dyn OrganizationsClient>,
        page_size: i32,
        pacing: &PacingConfig
    ) -> Self {
        Self {
            client,
            page_size,
            min_call_interval: pacing.min_call_interval(),
            soft_error_pause: pacing.soft_error_pause(),
            backoff: ThrottleBackoff::new(pacing.initial_backoff()),
            stats: FetchStats::default()
        }
    }

    pub fn backoff(&self) -> &ThrottleBackoff {
        &self.backoff
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Fetches the next page of `chain`, or `None` once the chain is exhausted.
    ///
    /// Follow-up pages are spaced at least `min_call_interval` after the
    /// previous call of the same chain. Throttled calls are retried with the
    /// same token after a backoff sleep; any other error is returned as-is.
    pub async fn next_page<O: ListOperation>(
        &mut self,
        operation: &O,
        chain: &mut CursorChain
    ) -> InventoryResult<Option<Vec<O::Item>>> {
        if chain.exhausted {
            return Ok(None);
        }

        if chain.next_token.is_some() {
            if let Some(last_call) = chain.last_call {
                let elapsed = last_call.elapsed();
                if elapsed < self.min_call_interval {
                    let delay = self.min_call_interval - elapsed;
                    debug!(
                        operation = operation.name(),
                        delay_ms = delay.as_millis() as u64,
                        "Spacing paginated call"
                    );
                    sleep(delay).await;
                }
            }
        }

        let page = loop {
            let issued_at = Instant::now();
            self.stats.api_calls += 1;

            let request = PageRequest {
                next_token: chain.next_token.as_deref(),
                max_results: self.page_size
            };
            let result = operation.call(self.client.as_ref(), request).await;

            match result {
                Ok(page) => {
                    chain.last_call = Some(issued_at);
                    break page;
                }
                Err(err) if err.is_throttling() => {
                    let delay = self.backoff.next_delay();
                    self.stats.throttled_retries += 1;
                    warn!(
                        operation = operation.name(),
                        delay_ms = delay.as_millis() as u64,
                        next_delay_ms = self.backoff.current().as_millis() as u64,
                        "Throttled, backing off before retry"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err)
            }
        };

        if page.status_code != 200 {
            self.stats.soft_errors += 1;
            warn!(
                operation = operation.name(),
                status = page.status_code,
                "Unexpected response status, using payload anyway"
            );
            sleep(self.soft_error_pause).await;
        }

        chain.pages += 1;
        chain.next_token = page.next_token;
        if chain.next_token.is_none() {
            chain.exhausted = true;
        }

        Ok(Some(page.items))
    }

    /// Drains a listing into a single vector.
    pub async fn fetch_all<O: ListOperation>(
        &mut self,
        operation: &O
    ) -> InventoryResult<Vec<O::Item>> {
        let mut chain = CursorChain::new();
        let mut items = Vec::new();

        while let Some(page) = self.next_page(operation, &mut chain).await? {
            items.extend(page);
        }

        debug!(
            operation = operation.name(),
            pages = chain.pages(),
            count = items.len(),
            "Listing complete"
        );
        Ok(items)
    }
}
