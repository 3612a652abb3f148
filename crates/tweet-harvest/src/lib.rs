//! TweetHarvest: collect timeline posts from a live browser session.
//!
//! A [`Harvester`] opens one browser session per [`Query`], scrolls the
//! feed until enough items have loaded or the feed stalls, and turns every
//! loaded item into a [`Record`].

pub mod browser;
pub mod collector;
pub mod extract;
pub mod harvester;
pub mod markup;
pub mod settings;
pub mod types;

pub use browser::chromium::{find_chromium, ChromiumFactory};
pub use browser::memory::{MemoryFactory, MemoryFeed};
pub use browser::{FeedPage, ItemHandle, SessionFactory};
pub use collector::{Collection, Collector};
pub use extract::Extractor;
pub use harvester::Harvester;
pub use markup::{BadgeKind, Markup, SelectorSet};
pub use settings::{BrowserSettings, HarvestSettings, DEFAULT_BASE_URL};
pub use types::*;
