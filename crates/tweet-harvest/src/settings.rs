//! Tunables for collection and browser launch.

use std::path::PathBuf;
use std::time::Duration;

/// Search endpoint used when no other base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://twitter.com/search";

/// Timing and stop-policy settings for a query session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Search endpoint the query expression is appended to.
    pub base_url: String,
    /// Grace period after navigation before the first count.
    pub initial_settle: Duration,
    /// Wait after each load-more action.
    pub settle: Duration,
    /// Consecutive non-productive load-more actions that end collection.
    pub stall_threshold: u32,
    pub navigation_timeout: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            initial_settle: Duration::from_secs(5),
            settle: Duration::from_secs(3),
            stall_threshold: 3,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

impl HarvestSettings {
    /// Settings with every wait set to zero, for scripted backends.
    pub fn immediate() -> Self {
        Self {
            initial_settle: Duration::ZERO,
            settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// How a Chromium instance is located and launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Explicit executable; discovery is used when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Extra command-line switches passed to the browser.
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
        }
    }
}
