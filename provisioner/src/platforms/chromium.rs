//! Chrome DevTools Protocol engine
//!
//! Elements are never cached: every operation re-resolves its XPath in the
//! live document, so a handle survives the console re-rendering a row or a
//! dialog between two calls.

use std::sync::Mutex as StdMutex;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{BrowserEngine, BrowserOptions};
use crate::element::{PageElement, PageElementImpl};
use crate::{AutomationError, Selector};

pub struct ChromiumEngine {
    browser: Mutex<Option<Browser>>,
    handler_task: StdMutex<Option<JoinHandle<()>>>,
    page: Page,
}

impl ChromiumEngine {
    #[instrument(skip(options), fields(headless = options.headless))]
    pub async fn launch(options: &BrowserOptions) -> Result<Self, AutomationError> {
        let mut builder =
            BrowserConfig::builder().window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|e| AutomationError::PlatformError(format!("Invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("chromium handler event error: {}", e);
                }
            }
            debug!("chromium handler stream ended");
        });

        let page = browser.new_page("about:blank").await?;
        info!("Browser session started");

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: StdMutex::new(Some(handler_task)),
            page,
        })
    }
}

#[async_trait::async_trait]
impl BrowserEngine for ChromiumEngine {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn find_element(&self, selector: &Selector) -> Result<PageElement, AutomationError> {
        let element = ChromiumElement {
            page: self.page.clone(),
            selector: selector.clone(),
            xpath: selector.to_xpath()?,
        };
        // Presence probe; the returned handle re-resolves on every call
        element.run("return true;").await?;
        Ok(PageElement::new(Box::new(element)))
    }

    async fn page_text(&self) -> Result<String, AutomationError> {
        let text = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await?
            .into_value::<String>()
            .map_err(|e| AutomationError::PlatformError(format!("page text: {e}")))?;
        Ok(text)
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, AutomationError> {
        let result = self.page.evaluate(script.to_string()).await?;
        // `undefined` comes back without a value
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<Option<String>, AutomationError> {
        Ok(self.page.url().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        let png = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        Ok(png)
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let browser = self.browser.lock().await.take();
        let Some(mut browser) = browser else {
            return Err(AutomationError::InvalidArgument(
                "browser session already closed".to_string(),
            ));
        };
        let closed = browser.close().await;
        let _ = browser.wait().await;
        if let Ok(mut task) = self.handler_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
        closed?;
        info!("Browser session closed");
        Ok(())
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        if let Ok(mut task) = self.handler_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

// Protocol messages for a document replaced under an in-flight evaluation
const NAVIGATION_ERRORS: [&str; 3] = [
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
];

fn lookup_error(e: CdpError) -> AutomationError {
    let message = e.to_string();
    if NAVIGATION_ERRORS.iter().any(|m| message.contains(m)) {
        AutomationError::PageNotReady(message)
    } else {
        e.into()
    }
}

#[derive(Debug, Clone)]
struct ChromiumElement {
    page: Page,
    selector: Selector,
    xpath: String,
}

impl ChromiumElement {
    /// Resolve the element and run `body` with `this` bound to it.
    async fn run(&self, body: &str) -> Result<serde_json::Value, AutomationError> {
        let xpath = serde_json::to_string(&self.xpath)
            .map_err(|e| AutomationError::Internal(format!("xpath encode: {e}")))?;
        let script = format!(
            r#"(() => {{
  const el = document.evaluate({xpath}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  if (!el) {{ return {{ found: false }}; }}
  const value = (function() {{ {body} }}).call(el);
  return {{ found: true, value: value === undefined ? null : value }};
}})()"#
        );
        let outcome = self
            .page
            .evaluate(script)
            .await
            .map_err(lookup_error)?
            .into_value::<serde_json::Value>()
            .map_err(|e| AutomationError::PlatformError(format!("element script: {e}")))?;

        if outcome.get("found").and_then(|v| v.as_bool()) != Some(true) {
            return Err(AutomationError::ElementNotFound(self.selector.to_string()));
        }
        Ok(outcome
            .get("value")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn resolve(&self) -> Result<chromiumoxide::element::Element, AutomationError> {
        self.page.find_xpath(self.xpath.clone()).await.map_err(|e| {
            AutomationError::ElementNotFound(format!("{} ({e})", self.selector))
        })
    }
}

#[async_trait::async_trait]
impl PageElementImpl for ChromiumElement {
    fn selector(&self) -> &Selector {
        &self.selector
    }

    async fn text(&self) -> Result<String, AutomationError> {
        let value = self.run("return this.innerText;").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        let name = serde_json::to_string(name)
            .map_err(|e| AutomationError::Internal(format!("attribute encode: {e}")))?;
        let value = self
            .run(&format!("return this.getAttribute({name});"))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn clear(&self) -> Result<(), AutomationError> {
        // Go through the native setter so framework-controlled inputs see it
        self.run(
            "const proto = Object.getPrototypeOf(this);
             const desc = Object.getOwnPropertyDescriptor(proto, 'value');
             if (desc && desc.set) { desc.set.call(this, ''); } else { this.value = ''; }
             this.dispatchEvent(new Event('input', { bubbles: true }));",
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let element = self.resolve().await?;
        element.focus().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self) -> Result<(), AutomationError> {
        let element = self.resolve().await?;
        element.click().await?;
        Ok(())
    }

    async fn submit(&self) -> Result<(), AutomationError> {
        self.run(
            "if (this.form && this.form.requestSubmit) {
               this.form.requestSubmit(this.type === 'submit' ? this : undefined);
             } else if (this.form) {
               this.form.submit();
             } else {
               this.click();
             }",
        )
        .await?;
        Ok(())
    }

    async fn toggle(&self) -> Result<(), AutomationError> {
        self.run("this.click();").await?;
        Ok(())
    }

    async fn is_selected(&self) -> Result<bool, AutomationError> {
        let value = self.run("return !!this.checked;").await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_clickable(&self) -> Result<bool, AutomationError> {
        let value = self
            .run(
                "const r = this.getBoundingClientRect();
                 const s = window.getComputedStyle(this);
                 return !this.disabled && r.width > 0 && r.height > 0
                   && s.visibility !== 'hidden' && s.display !== 'none';",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn scroll_into_view(&self) -> Result<(), AutomationError> {
        self.run("this.scrollIntoView({ block: 'center', inline: 'nearest' });")
            .await?;
        Ok(())
    }

    async fn call_function(
        &self,
        declaration: &str,
    ) -> Result<serde_json::Value, AutomationError> {
        self.run(&format!("return ({declaration}).call(this);")).await
    }

    fn clone_box(&self) -> Box<dyn PageElementImpl> {
        Box::new(self.clone())
    }
}
