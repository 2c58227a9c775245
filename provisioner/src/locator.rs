use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::element::PageElement;
use crate::errors::AutomationError;
use crate::platforms::BrowserEngine;
use crate::selector::Selector;

// Bound for waits that are not given one
const DEFAULT_WAIT: Duration = Duration::from_secs(60);

// How often a waiting locator re-queries the page
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A selector bound to a page, resolved lazily
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn BrowserEngine>,
    selector: Selector,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn BrowserEngine>, selector: Selector) -> Self {
        Self { engine, selector }
    }

    /// Resolve once, failing with `ElementNotFound` if nothing matches yet.
    pub async fn first(&self) -> Result<PageElement, AutomationError> {
        self.engine.find_element(&self.selector).await
    }

    /// Poll until an element matches, or fail with `Timeout` after
    /// `timeout` (60 s when `None`).
    #[instrument(level = "debug", skip(self, timeout), fields(selector = %self.selector))]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<PageElement, AutomationError> {
        self.poll(timeout, "to appear", |_| async { Ok(true) }).await
    }

    /// Poll until the element is present and can take a pointer click.
    #[instrument(level = "debug", skip(self, timeout), fields(selector = %self.selector))]
    pub async fn wait_until_clickable(
        &self,
        timeout: Option<Duration>,
    ) -> Result<PageElement, AutomationError> {
        self.poll(timeout, "to become clickable", |element| async move {
            element.is_clickable().await
        })
        .await
    }

    async fn poll<F, Fut>(
        &self,
        timeout: Option<Duration>,
        condition: &str,
        ready: F,
    ) -> Result<PageElement, AutomationError>
    where
        F: Fn(PageElement) -> Fut,
        Fut: std::future::Future<Output = Result<bool, AutomationError>>,
    {
        let bound = timeout.unwrap_or(DEFAULT_WAIT);
        let deadline = Instant::now() + bound;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.engine.find_element(&self.selector).await {
                Ok(element) => match ready(element.clone()).await {
                    Ok(true) => {
                        debug!(attempts, "Element matched {}", condition);
                        return Ok(element);
                    }
                    Ok(false) => {}
                    Err(e) if is_transient(&e) => debug!("Element check failed: {}", e),
                    Err(e) => return Err(e),
                },
                // The page may be mid-navigation; keep polling until the deadline
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "Timed out after {bound:?} waiting for {} {condition}",
                    self.selector
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Narrow to `selector`, resolved relative to this locator's match.
    /// Nested chains are flattened.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        let mut steps = match self.selector.clone() {
            Selector::Chain(steps) => steps,
            single => vec![single],
        };
        match selector.into() {
            Selector::Chain(mut more) => steps.append(&mut more),
            single => steps.push(single),
        }
        Locator::new(self.engine.clone(), Selector::Chain(steps))
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// Errors a waiting lookup polls through. Anything else, a dropped CDP
/// connection included, ends the wait at once.
pub(crate) fn is_transient(error: &AutomationError) -> bool {
    matches!(
        error,
        AutomationError::ElementNotFound(_) | AutomationError::PageNotReady(_)
    )
}
