//! Browser abstraction for feed collection.
//!
//! Defines the `SessionFactory`, `FeedPage` and `ItemHandle` traits that
//! abstract over the browser engine (Chromium via chromiumoxide, or the
//! scripted in-memory backend).

pub mod chromium;
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{DriverError, HarvestResult};

/// Creates one browser session per query.
///
/// Sessions are never shared or reused: every call to `open` yields a fresh
/// page the caller owns until it calls [`FeedPage::close`].
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Acquire a new session.
    async fn open(&self) -> HarvestResult<Box<dyn FeedPage>>;
}

/// A single live page showing a scrollable feed.
#[async_trait]
pub trait FeedPage: Send + Sync {
    /// Navigate to `url` within `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarvestResult<()>;

    /// All elements currently matching `selector`, in document order.
    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(self.items(selector).await?.len())
    }

    /// Trigger one "load more" action (scroll to the end of the document).
    async fn load_more(&mut self) -> Result<(), DriverError>;

    /// Release the page and the browser behind it.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// A reference to one rendered element, valid while its page is open.
#[async_trait]
pub trait ItemHandle: Send + Sync {
    /// First descendant matching `selector`.
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ItemHandle>>, DriverError>;

    /// All descendants matching `selector`, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError>;

    /// Rendered text of the element.
    async fn text(&self) -> Result<String, DriverError>;

    /// Value of attribute `name`, if present.
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
}
