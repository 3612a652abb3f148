//! Chromium-based sessions using chromiumoxide.

use super::{FeedPage, ItemHandle, SessionFactory};
use crate::settings::BrowserSettings;
use crate::types::{DriverError, HarvestError, HarvestResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Environment variable pointing at a Chromium executable.
pub const CHROMIUM_ENV: &str = "TWEET_HARVEST_CHROMIUM";

const SCROLL_TO_END: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit setting
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured Chromium executable does not exist");
    }

    // 2. TWEET_HARVEST_CHROMIUM env
    if let Ok(p) = std::env::var(CHROMIUM_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.tweet-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".tweet-harvest/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".tweet-harvest/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".tweet-harvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".tweet-harvest/chromium/chrome-linux64/chrome"),
                home.join(".tweet-harvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches a dedicated headless Chromium for every session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumFactory {
    settings: BrowserSettings,
}

impl ChromiumFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn executable(&self) -> HarvestResult<PathBuf> {
        if !cfg!(any(target_os = "linux", target_os = "macos")) {
            return Err(HarvestError::UnsupportedPlatform(format!(
                "browser sessions are only supported on Linux and macOS, not {}",
                std::env::consts::OS
            )));
        }
        find_chromium(self.settings.executable.as_deref()).ok_or_else(|| {
            HarvestError::UnsupportedPlatform(format!(
                "no Chromium executable found; install Chrome/Chromium or set {CHROMIUM_ENV}"
            ))
        })
    }

    fn config(&self, executable: PathBuf) -> HarvestResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.settings.headless {
            builder = builder.with_head();
        }
        for arg in &self.settings.extra_args {
            builder = builder.arg(arg.as_str());
        }
        builder
            .build()
            .map_err(|e| HarvestError::SessionAcquisition(format!("invalid browser config: {e}")))
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn open(&self) -> HarvestResult<Box<dyn FeedPage>> {
        let executable = self.executable()?;
        debug!(executable = %executable.display(), "launching Chromium");
        let config = self.config(executable)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::SessionAcquisition(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(HarvestError::SessionAcquisition(format!(
                    "failed to create page: {e}"
                )));
            }
        };

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler,
        }))
    }
}

/// A Chromium process with the single page it renders the feed in.
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

fn wrap_elements(elements: Vec<Element>) -> Vec<Box<dyn ItemHandle>> {
    elements
        .into_iter()
        .map(|element| Box::new(ChromiumItem { element }) as Box<dyn ItemHandle>)
        .collect()
}

#[async_trait]
impl FeedPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarvestResult<()> {
        let navigation = |reason: String| HarvestError::Navigation {
            url: url.to_string(),
            reason,
        };

        // goto and the load wait share one deadline
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(navigation(e.to_string())),
            Err(_) => Err(navigation(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn items(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError> {
        let elements = self.page.find_elements(selector).await.map_err(protocol)?;
        Ok(wrap_elements(elements))
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let literal = serde_json::to_string(selector).map_err(protocol)?;
        let script = format!("document.querySelectorAll({literal}).length");
        self.page
            .evaluate(script.as_str())
            .await
            .map_err(protocol)?
            .into_value::<usize>()
            .map_err(|e| DriverError::Protocol(format!("unexpected count result: {e:?}")))
    }

    async fn load_more(&mut self) -> Result<(), DriverError> {
        self.page.evaluate(SCROLL_TO_END).await.map_err(protocol)?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let ChromiumPage {
            mut browser,
            page,
            handler,
        } = *self;

        if let Err(e) = page.close().await {
            debug!("page close failed: {e}");
        }
        let result = browser.close().await.map(|_| ()).map_err(protocol);
        if let Err(e) = browser.wait().await {
            debug!("waiting for Chromium to exit failed: {e}");
        }
        handler.abort();
        result
    }
}

/// One element inside a Chromium page.
pub struct ChromiumItem {
    element: Element,
}

#[async_trait]
impl ItemHandle for ChromiumItem {
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ItemHandle>>, DriverError> {
        let mut found = self.find_all(selector).await?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ItemHandle>>, DriverError> {
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(protocol)?;
        Ok(wrap_elements(elements))
    }

    async fn text(&self) -> Result<String, DriverError> {
        Ok(self
            .element
            .inner_text()
            .await
            .map_err(protocol)?
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.element.attribute(name).await.map_err(protocol)
    }
}
