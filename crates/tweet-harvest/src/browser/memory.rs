//! Scripted in-memory backend.
//!
//! Serves a feed of static HTML snippets that grows by a fixed number of
//! items per load-more action, so collection and extraction can run without
//! a browser. Selectors are evaluated with `scraper`.

use super::{FeedPage, ItemHandle, SessionFactory};
use crate::types::{DriverError, HarvestError, HarvestResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The content a memory session renders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryFeed {
    /// Outer HTML of every item, in feed order.
    pub items: Vec<String>,
    /// Items visible right after navigation; all of them when unset.
    #[serde(default)]
    pub first_paint: Option<usize>,
    /// Items revealed by each load-more action.
    #[serde(default)]
    pub per_load: usize,
}

impl MemoryFeed {
    /// A feed whose items are all visible on first paint.
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            first_paint: None,
            per_load: 0,
        }
    }

    /// Reveal `first_paint` items on navigation and `per_load` more per action.
    pub fn paged(mut self, first_paint: usize, per_load: usize) -> Self {
        self.first_paint = Some(first_paint);
        self.per_load = per_load;
        self
    }

    /// Parse a feed from its JSON fixture form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn initial_visible(&self) -> usize {
        self.first_paint
            .unwrap_or(self.items.len())
            .min(self.items.len())
    }
}

/// Counters shared by a factory and every session it opened.
#[derive(Debug, Default)]
pub struct MemoryStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    loads: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl MemoryStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Load-more actions performed across all sessions.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// URL of the most recent navigation.
    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().ok().and_then(|url| url.clone())
    }
}

/// Opens sessions over a [`MemoryFeed`].
#[derive(Debug, Clone)]
pub struct MemoryFactory {
    feed: Arc<MemoryFeed>,
    stats: Arc<MemoryStats>,
    unavailable: Option<String>,
    navigation_error: Option<String>,
}

impl MemoryFactory {
    pub fn new(feed: MemoryFeed) -> Self {
        Self {
            feed: Arc::new(feed),
            stats: Arc::new(MemoryStats::default()),
            unavailable: None,
            navigation_error: None,
        }
    }

    /// A factory whose sessions can never be acquired.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new(MemoryFeed::default())
        }
    }

    /// Make every navigation fail with `reason`.
    pub fn failing_navigation(mut self, reason: impl Into<String>) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl SessionFactory for MemoryFactory {
    async fn open(&self) -> HarvestResult<Box<dyn FeedPage>> {
        if let Some(reason) = &self.unavailable {
            return Err(HarvestError::SessionAcquisition(reason.clone()));
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryPage {
            feed: Arc::clone(&self.feed),
            stats: Arc::clone(&self.stats),
            navigation_error: self.navigation_error.clone(),
            visible: 0,
        }))
    }
}

/// One open memory session.
pub struct MemoryPage {
    feed: Arc<MemoryFeed>,
    stats: Arc<MemoryStats>,
    navigation_error: Option<String>,
    visible: usize,
}

impl MemoryPage {
    fn select(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_fragment(&self.feed.items[..self.visible].concat());
        Ok(document
            .select(&selector)
            .map(|element| StaticItem::boxed(element.html()))
            .collect())
    }
}

#[async_trait]
impl FeedPage for MemoryPage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> HarvestResult<()> {
        if let Ok(mut last) = self.stats.last_url.lock() {
            *last = Some(url.to_string());
        }
        if let Some(reason) = &self.navigation_error {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }
        self.visible = self.feed.initial_visible();
        Ok(())
    }

    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError> {
        self.select(selector)
    }

    async fn load_more(&mut self) -> Result<(), DriverError> {
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        self.visible = (self.visible + self.feed.per_load).min(self.feed.items.len());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An element detached from any page, kept as its outer HTML.
#[derive(Debug, Clone)]
pub struct StaticItem {
    html: String,
}

impl StaticItem {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    fn boxed(html: String) -> Box<dyn ItemHandle> {
        Box::new(Self { html })
    }

    fn with_root<R>(&self, f: impl FnOnce(ElementRef<'_>) -> R) -> Option<R> {
        let fragment = Html::parse_fragment(&self.html);
        let root = fragment.root_element().children().find_map(ElementRef::wrap);
        root.map(f)
    }

    fn descendants(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .with_root(|root| {
                root.select(&selector)
                    .filter(|element| element.id() != root.id())
                    .map(|element| element.html())
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|e| DriverError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ItemHandle for StaticItem {
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ItemHandle>>, DriverError> {
        Ok(self
            .descendants(selector)?
            .into_iter()
            .next()
            .map(StaticItem::boxed))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError> {
        Ok(self
            .descendants(selector)?
            .into_iter()
            .map(StaticItem::boxed)
            .collect())
    }

    async fn text(&self) -> Result<String, DriverError> {
        Ok(self
            .with_root(|root| root.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self
            .with_root(|root| root.value().attr(name).map(str::to_string))
            .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> String {
        format!(r#"<div class="tweet" data-n="{n}"><p class="tweet-text">post {n}</p></div>"#)
    }

    #[tokio::test]
    async fn test_paged_feed_grows_per_load() {
        let feed = MemoryFeed::new((0..5).map(item).collect()).paged(2, 2);
        let factory = MemoryFactory::new(feed);
        let mut page = factory.open().await.unwrap();

        assert_eq!(page.count(".tweet").await.unwrap(), 0);
        page.navigate("memory://feed", Duration::ZERO).await.unwrap();
        assert_eq!(page.count(".tweet").await.unwrap(), 2);
        page.load_more().await.unwrap();
        assert_eq!(page.count(".tweet").await.unwrap(), 4);
        page.load_more().await.unwrap();
        page.load_more().await.unwrap();
        assert_eq!(page.count(".tweet").await.unwrap(), 5);

        page.close().await.unwrap();
        let stats = factory.stats();
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);
        assert_eq!(stats.loads(), 3);
        assert_eq!(stats.last_url().as_deref(), Some("memory://feed"));
    }

    #[tokio::test]
    async fn test_static_item_queries() {
        let item = StaticItem::new(
            r#"<div class="tweet"><a class="account-group" href="https://x.test/jane" data-user-id="7"><b class="fullname">Jane</b></a><s class="twitter-hashtag">#a</s><s class="twitter-hashtag">#b</s></div>"#,
        );

        let account = item.find(".account-group").await.unwrap().expect("account");
        assert_eq!(account.attribute("data-user-id").await.unwrap().as_deref(), Some("7"));
        assert_eq!(account.attribute("missing").await.unwrap(), None);

        let name = account.find(".fullname").await.unwrap().expect("name");
        assert_eq!(name.text().await.unwrap(), "Jane");

        let tags = item.find_all(".twitter-hashtag").await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].text().await.unwrap(), "#b");

        assert!(item.find(".tweet-text").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_selector_is_reported() {
        let item = StaticItem::new("<div></div>");
        let err = item.find("[[").await.err().expect("error");
        assert!(matches!(err, DriverError::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_factory() {
        let factory = MemoryFactory::unavailable("no browser");
        let err = factory.open().await.err().expect("error");
        assert!(matches!(err, HarvestError::SessionAcquisition(_)));
    }

    #[test]
    fn test_feed_from_json_fixture() {
        let feed = MemoryFeed::from_json(r#"{"items": ["<div></div>"], "per_load": 1}"#).unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.first_paint, None);
        assert_eq!(feed.per_load, 1);
    }
}
