//! Console automation for provisioning an AWS root account
//!
//! A [`Browser`] wraps one exclusively owned page session behind the
//! [`platforms::BrowserEngine`] trait. The signup flow and the root console
//! session each drive their own `Browser`, synchronising on
//! [`PageWaypoint`]s and handing CAPTCHAs and verification codes to a
//! [`HumanInterface`].

use std::sync::Arc;

use tracing::{debug, info, instrument};

pub mod captcha;
pub mod config;
pub mod credentials;
pub mod element;
pub mod errors;
pub mod forms;
pub mod human;
pub mod locator;
pub mod platforms;
pub mod root_console;
pub mod selector;
pub mod signup;
#[cfg(test)]
mod tests;
pub mod waypoint;
pub mod workflow;

pub use captcha::{CaptchaSolver, ChallengeImage, ChallengeSource};
pub use config::{
    AccountTemplates, BillingInformation, ContactInformation, IdentityVerificationInfo,
    ProvisionerConfig, SessionSettings, Timeouts,
};
pub use credentials::{generate_credentials, save_credentials, Credentials};
pub use element::PageElement;
pub use errors::AutomationError;
pub use human::{HumanInterface, TerminalHuman};
pub use locator::Locator;
pub use platforms::{BrowserEngine, BrowserOptions};
pub use root_console::{AccessKey, CreateAccessKeyResponse, RootConsoleSession};
pub use selector::Selector;
pub use signup::{SignupFlow, SignupStep, VerificationMethod};
pub use waypoint::PageWaypoint;
pub use workflow::{
    create_root_access_key, provision_root_account, ChromiumLauncher, ProvisionOptions,
    ProvisionOutcome, ScopedSession, SessionLauncher,
};

/// One page session on the remote console
pub struct Browser {
    engine: Arc<dyn platforms::BrowserEngine>,
}

impl Browser {
    /// Launch a new Chromium session
    #[instrument(skip(options))]
    pub async fn launch(options: &BrowserOptions) -> Result<Self, AutomationError> {
        let engine = platforms::create_engine(options).await?;
        Ok(Self { engine })
    }

    /// Wrap an already running engine
    pub fn from_engine(engine: Arc<dyn platforms::BrowserEngine>) -> Self {
        Self { engine }
    }

    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        info!("Navigating to {}", url);
        self.engine.navigate(url).await
    }

    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
    }

    /// Block until the waypoint's marker is on the page, failing with
    /// `Timeout` once its bound has passed.
    #[instrument(skip(self), fields(marker = %waypoint.marker))]
    pub async fn wait_for(&self, waypoint: &PageWaypoint) -> Result<PageElement, AutomationError> {
        debug!("Waiting for waypoint {}", waypoint);
        self.locator(waypoint.selector())
            .wait(Some(waypoint.timeout))
            .await
    }

    /// Like [`Browser::wait_for`], but a waypoint that never shows up is an
    /// answer rather than an error.
    pub async fn probe(&self, waypoint: &PageWaypoint) -> Result<bool, AutomationError> {
        match self.wait_for(waypoint).await {
            Ok(_) => Ok(true),
            Err(AutomationError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn page_text(&self) -> Result<String, AutomationError> {
        self.engine.page_text().await
    }

    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value, AutomationError> {
        self.engine.execute_script(script).await
    }

    pub async fn current_url(&self) -> Result<Option<String>, AutomationError> {
        self.engine.current_url().await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        self.engine.screenshot().await
    }

    /// Release the session. Must be called exactly once; see
    /// [`ScopedSession`] for the usual way to get that right.
    pub async fn close(&self) -> Result<(), AutomationError> {
        self.engine.close().await
    }
}

impl Clone for Browser {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}
