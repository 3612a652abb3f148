//! Configuration loading and resolution.
//!
//! Every setting resolves as: command-line flag, then environment variable,
//! then built-in default.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use tweet_harvest::{
    BrowserSettings, ChromiumFactory, HarvestSettings, Harvester, Markup, MemoryFactory,
    MemoryFeed, SelectorSet, SessionFactory, DEFAULT_LIMIT,
};

/// Listen address used when neither `--addr` nor the environment set one.
pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

pub const ADDR_ENV: &str = "TWEET_HARVEST_ADDR";
pub const BASE_URL_ENV: &str = "TWEET_HARVEST_BASE_URL";
pub const SELECTORS_ENV: &str = "TWEET_HARVEST_SELECTORS";

/// Resolve the listen address.
pub fn resolve_addr(explicit: Option<&str>) -> String {
    if let Some(addr) = explicit {
        return addr.to_string();
    }

    if let Ok(env_addr) = std::env::var(ADDR_ENV) {
        return env_addr;
    }

    DEFAULT_ADDR.to_string()
}

/// Resolve the search endpoint.
pub fn resolve_base_url(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(BASE_URL_ENV).ok())
        .unwrap_or_else(|| tweet_harvest::DEFAULT_BASE_URL.to_string())
}

/// Resolve the optional selector file.
pub fn resolve_selectors_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(SELECTORS_ENV).ok().map(PathBuf::from))
}

/// Load the selector set from `path`, or the built-in one.
pub fn load_markup(path: Option<&Path>) -> anyhow::Result<Arc<dyn Markup>> {
    let set = match path {
        Some(path) => SelectorSet::from_file(path)
            .with_context(|| format!("failed to load selectors from {}", path.display()))?,
        None => SelectorSet::default(),
    };
    Ok(Arc::new(set))
}

/// Load a scripted feed fixture (JSON) for the in-memory backend.
pub fn load_fixture(path: &Path) -> anyhow::Result<MemoryFeed> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    MemoryFeed::from_json(&raw)
        .with_context(|| format!("invalid fixture {}", path.display()))
}

/// Harvesting flags shared by `serve` and `scrape`.
#[derive(Args, Debug, Clone, Default)]
pub struct HarvestArgs {
    /// Path to the Chromium/Chrome executable.
    #[arg(long)]
    pub chromium: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub headful: bool,

    /// Extra switch passed to the browser. Can be repeated.
    #[arg(long = "browser-arg", allow_hyphen_values = true)]
    pub browser_args: Vec<String>,

    /// Search endpoint the query is appended to.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Grace period after navigation, in milliseconds.
    #[arg(long)]
    pub initial_settle_ms: Option<u64>,

    /// Wait after each scroll, in milliseconds.
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Consecutive unproductive scrolls before the feed counts as exhausted.
    #[arg(long)]
    pub stall_threshold: Option<u32>,

    /// Navigation timeout, in milliseconds.
    #[arg(long)]
    pub navigation_timeout_ms: Option<u64>,

    /// JSON file overriding the default selectors.
    #[arg(long)]
    pub selectors: Option<PathBuf>,

    /// Serve a scripted JSON feed instead of launching a browser.
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Limit used when a request does not specify one.
    #[arg(long)]
    pub default_limit: Option<usize>,
}

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub harvest: HarvestSettings,
    pub browser: BrowserSettings,
    pub selectors: Option<PathBuf>,
    pub fixture: Option<PathBuf>,
    pub default_limit: usize,
}

impl From<HarvestArgs> for ServiceConfig {
    fn from(args: HarvestArgs) -> Self {
        let defaults = HarvestSettings::default();
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };

        Self {
            harvest: HarvestSettings {
                base_url: resolve_base_url(args.base_url.as_deref()),
                initial_settle: millis(args.initial_settle_ms, defaults.initial_settle),
                settle: millis(args.settle_ms, defaults.settle),
                stall_threshold: args.stall_threshold.unwrap_or(defaults.stall_threshold),
                navigation_timeout: millis(args.navigation_timeout_ms, defaults.navigation_timeout),
            },
            browser: BrowserSettings {
                executable: args.chromium,
                headless: !args.headful,
                extra_args: args.browser_args,
            },
            selectors: resolve_selectors_path(args.selectors.as_deref()),
            fixture: args.fixture,
            default_limit: args.default_limit.filter(|n| *n > 0).unwrap_or(DEFAULT_LIMIT),
        }
    }
}

impl ServiceConfig {
    /// Build the session factory: the fixture feed if configured, Chromium otherwise.
    pub fn session_factory(&self) -> anyhow::Result<Arc<dyn SessionFactory>> {
        match &self.fixture {
            Some(path) => {
                let feed = load_fixture(path)?;
                tracing::info!(
                    "Serving fixture feed {} ({} items)",
                    path.display(),
                    feed.items.len()
                );
                Ok(Arc::new(MemoryFactory::new(feed)))
            }
            None => Ok(Arc::new(ChromiumFactory::new(self.browser.clone()))),
        }
    }

    pub fn harvester(&self) -> anyhow::Result<Harvester> {
        let markup = load_markup(self.selectors.as_deref())?;
        Ok(Harvester::new(self.session_factory()?, &self.harvest).with_markup(markup))
    }
}
