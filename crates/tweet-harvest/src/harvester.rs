//! Query sessions: one browser session per query, end to end.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::browser::{FeedPage, SessionFactory};
use crate::collector::{Collection, Collector};
use crate::extract::Extractor;
use crate::markup::{Markup, SelectorSet};
use crate::settings::HarvestSettings;
use crate::types::{Harvest, HarvestError, HarvestResult, Query};

/// Runs queries against sessions produced by a [`SessionFactory`].
///
/// Cheap to clone; clones share the factory and markup. Every call to
/// [`Harvester::run`] acquires its own session and releases it before
/// returning, so concurrent runs never share browser state.
#[derive(Clone)]
pub struct Harvester {
    factory: Arc<dyn SessionFactory>,
    markup: Arc<dyn Markup>,
    collector: Collector,
    base_url: String,
}

impl Harvester {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: &HarvestSettings) -> Self {
        Self {
            factory,
            markup: Arc::new(SelectorSet::default()),
            collector: Collector::new(settings),
            base_url: settings.base_url.clone(),
        }
    }

    /// Replace the default selectors.
    pub fn with_markup(mut self, markup: Arc<dyn Markup>) -> Self {
        self.markup = markup;
        self
    }

    /// Search URL for `query`.
    pub fn url_for(&self, query: &Query) -> String {
        query.url(&self.base_url)
    }

    /// Run `query` to completion.
    ///
    /// The session is released on every exit path, including collection
    /// failures and cancellation. Items that fail extraction are dropped and
    /// counted in [`Harvest::skipped`]; if every loaded item fails, the
    /// individual failures are returned as [`HarvestError::NoRecordExtracted`].
    pub async fn run(&self, query: &Query, cancel: &CancellationToken) -> HarvestResult<Harvest> {
        let span = info_span!(
            "harvest",
            kind = %query.kind(),
            term = query.term(),
            limit = query.limit()
        );
        self.run_inner(query, cancel).instrument(span).await
    }

    async fn run_inner(&self, query: &Query, cancel: &CancellationToken) -> HarvestResult<Harvest> {
        let mut page = self.factory.open().await?;
        let result = self.harvest(page.as_mut(), query, cancel).await;

        if let Err(e) = page.close().await {
            warn!("failed to release browser session: {e}");
        }

        match &result {
            Ok(harvest) => info!(
                records = harvest.records.len(),
                skipped = harvest.skipped,
                termination = harvest.termination.as_str(),
                "harvest finished"
            ),
            Err(e) => warn!("harvest failed: {e}"),
        }
        result
    }

    async fn harvest(
        &self,
        page: &mut dyn FeedPage,
        query: &Query,
        cancel: &CancellationToken,
    ) -> HarvestResult<Harvest> {
        let url = self.url_for(query);
        info!(%url, "collecting");

        let Collection { items, termination } = self
            .collector
            .collect(page, &url, self.markup.item(), query.limit(), cancel)
            .await?;

        let extractor = Extractor::new(self.markup.as_ref());
        let mut records = Vec::with_capacity(items.len());
        let mut failures = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            match extractor.extract(item.as_ref()).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(index, "dropping item: {e}");
                    failures.push(e);
                }
            }
        }

        if records.is_empty() && !failures.is_empty() {
            return Err(HarvestError::NoRecordExtracted { failures });
        }

        Ok(Harvest {
            records,
            termination,
            skipped: failures.len(),
        })
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("collector", &self.collector)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
