use std::fmt::Debug;

use tracing::instrument;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// Interface for engine-specific element implementations
#[async_trait::async_trait]
pub trait PageElementImpl: Send + Sync + Debug {
    /// The selector this handle was resolved from
    fn selector(&self) -> &Selector;
    /// Rendered text of the element and its descendants
    async fn text(&self) -> Result<String, AutomationError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError>;
    async fn clear(&self) -> Result<(), AutomationError>;
    async fn type_text(&self, text: &str) -> Result<(), AutomationError>;
    async fn click(&self) -> Result<(), AutomationError>;
    /// Submit the enclosing form with this element as the submitter.
    async fn submit(&self) -> Result<(), AutomationError>;
    /// Flip a radio button or checkbox the way a space key press would.
    async fn toggle(&self) -> Result<(), AutomationError>;
    async fn is_selected(&self) -> Result<bool, AutomationError>;
    /// Visible and enabled
    async fn is_clickable(&self) -> Result<bool, AutomationError>;
    /// Scroll so the element sits at the vertical centre of the viewport
    async fn scroll_into_view(&self) -> Result<(), AutomationError>;
    /// Call `function() { ... }` with `this` bound to the element
    async fn call_function(&self, declaration: &str)
        -> Result<serde_json::Value, AutomationError>;
    fn clone_box(&self) -> Box<dyn PageElementImpl>;
}

/// An element on the page located through a [`crate::Locator`]
#[derive(Debug)]
pub struct PageElement {
    inner: Box<dyn PageElementImpl>,
}

impl PageElement {
    /// Create a new element from an engine-specific implementation
    pub fn new(impl_: Box<dyn PageElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    pub fn selector(&self) -> &Selector {
        self.inner.selector()
    }

    /// Get text content of this element
    pub async fn text(&self) -> Result<String, AutomationError> {
        self.inner.text().await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.inner.attribute(name).await
    }

    /// Replace the current value with `text`
    #[instrument(level = "debug", skip(self, text), fields(selector = %self.selector()))]
    pub async fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.inner.clear().await?;
        self.inner.type_text(text).await
    }

    /// Click on this element
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector()))]
    pub async fn click(&self) -> Result<(), AutomationError> {
        self.inner.click().await
    }

    #[instrument(level = "debug", skip(self), fields(selector = %self.selector()))]
    pub async fn submit(&self) -> Result<(), AutomationError> {
        self.inner.submit().await
    }

    pub async fn toggle(&self) -> Result<(), AutomationError> {
        self.inner.toggle().await
    }

    pub async fn is_selected(&self) -> Result<bool, AutomationError> {
        self.inner.is_selected().await
    }

    /// Bring a radio button or checkbox to the desired state, leaving it
    /// alone when it already matches.
    pub async fn set_selected(&self, state: bool) -> Result<(), AutomationError> {
        if self.inner.is_selected().await? != state {
            self.inner.toggle().await?;
        }
        Ok(())
    }

    pub async fn is_clickable(&self) -> Result<bool, AutomationError> {
        self.inner.is_clickable().await
    }

    pub async fn scroll_into_view(&self) -> Result<(), AutomationError> {
        self.inner.scroll_into_view().await
    }

    pub async fn call_function(
        &self,
        declaration: &str,
    ) -> Result<serde_json::Value, AutomationError> {
        self.inner.call_function(declaration).await
    }
}

impl Clone for PageElement {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}
