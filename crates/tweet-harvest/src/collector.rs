//! Incremental collection of feed items.
//!
//! Navigates to the feed, then alternates between counting loaded items and
//! triggering "load more" until either `limit` items are present or the feed
//! stops growing for `stall_threshold` consecutive actions.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::browser::{FeedPage, ItemHandle};
use crate::settings::HarvestSettings;
use crate::types::{HarvestError, HarvestResult, Termination};

/// Items gathered by one collection pass and the reason it stopped.
pub struct Collection {
    /// At most `limit` handles, in document order.
    pub items: Vec<Box<dyn ItemHandle>>,
    pub termination: Termination,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("items", &self.items.len())
            .field("termination", &self.termination)
            .finish()
    }
}

/// Progress of the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CollectionState {
    /// Items present at the latest count.
    loaded_count: usize,
    /// Highest count seen so far.
    peak_count: usize,
    /// Consecutive load-more actions that produced nothing.
    stall_count: u32,
}

impl CollectionState {
    fn start(count: usize) -> Self {
        Self {
            loaded_count: count,
            peak_count: count,
            stall_count: 0,
        }
    }

    /// Record the count observed after a load-more action. Growth is
    /// measured against the previous count.
    fn observe(&mut self, count: usize) {
        if count > self.loaded_count {
            self.stall_count = 0;
        } else {
            self.stall_count += 1;
        }
        self.loaded_count = count;
        self.peak_count = self.peak_count.max(count);
    }
}

/// Drives progressive loading of a feed page.
#[derive(Debug, Clone)]
pub struct Collector {
    initial_settle: Duration,
    settle: Duration,
    stall_threshold: u32,
    navigation_timeout: Duration,
}

impl Collector {
    pub fn new(settings: &HarvestSettings) -> Self {
        Self {
            initial_settle: settings.initial_settle,
            settle: settings.settle,
            stall_threshold: settings.stall_threshold.max(1),
            navigation_timeout: settings.navigation_timeout,
        }
    }

    /// Load `url` and collect up to `limit` items matching `item_selector`.
    ///
    /// Reaching the end of the feed is not an error; it is reported as
    /// [`Termination::FeedExhausted`] together with whatever was loaded.
    pub async fn collect(
        &self,
        page: &mut dyn FeedPage,
        url: &str,
        item_selector: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> HarvestResult<Collection> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
            navigated = page.navigate(url, self.navigation_timeout) => navigated?,
        }
        settle(self.initial_settle, cancel).await?;

        let mut state = CollectionState::start(page.count(item_selector).await?);

        let termination = loop {
            if state.loaded_count >= limit {
                break Termination::LimitReached;
            }
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            page.load_more().await?;
            settle(self.settle, cancel).await?;

            let count = page.count(item_selector).await?;
            state.observe(count);
            debug!(
                loaded = state.loaded_count,
                peak = state.peak_count,
                stalls = state.stall_count,
                limit,
                "poll"
            );

            if state.stall_count >= self.stall_threshold {
                break Termination::FeedExhausted {
                    stalls: state.stall_count,
                };
            }
        };

        let mut items = page.items(item_selector).await?;
        items.truncate(limit);
        Ok(Collection { items, termination })
    }
}

/// Wait for the page to settle, or fail early if cancelled.
async fn settle(interval: Duration, cancel: &CancellationToken) -> HarvestResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}
