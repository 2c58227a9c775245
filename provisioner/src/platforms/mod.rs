use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::{AutomationError, PageElement, Selector};

pub mod chromium;

/// Launch options for the browser behind an engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Run without a visible window. The operator normally needs to watch
    /// the page, so this is off unless asked for.
    pub headless: bool,
    /// Explicit Chrome/Chromium binary; autodetected when absent
    pub executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            window_width: 1280,
            window_height: 1024,
        }
    }
}

/// The common trait that every browser engine must implement
///
/// Lookups are single attempts: polling and timeouts live in
/// [`crate::Locator`], so an engine never waits on its own.
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Load `url` in the session's page
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Find the first element matching a selector right now, failing with
    /// `ElementNotFound` if there is none
    async fn find_element(&self, selector: &Selector) -> Result<PageElement, AutomationError>;

    /// Rendered text of the whole document body
    async fn page_text(&self) -> Result<String, AutomationError>;

    /// Evaluate a script in the page and return its JSON result
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, AutomationError>;

    /// Current page URL, if the page has one
    async fn current_url(&self) -> Result<Option<String>, AutomationError>;

    /// PNG screenshot of the current page
    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError>;

    /// Shut the session down; later calls fail
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Launch a Chromium-backed engine with its own browser process
pub async fn create_engine(
    options: &BrowserOptions,
) -> Result<Arc<dyn BrowserEngine>, AutomationError> {
    let engine = chromium::ChromiumEngine::launch(options).await?;
    Ok(Arc::new(engine))
}
