//! End-to-end runs: credentials first, then one browser session per flow
//!
//! Every session is acquired through [`ScopedSession`], which closes it on
//! the way out whether the flow succeeded or not.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::config::{ProvisionerConfig, Timeouts};
use crate::credentials::{generate_credentials, save_credentials, write_private, Credentials};
use crate::human::HumanInterface;
use crate::platforms::BrowserOptions;
use crate::root_console::{AccessKey, RootConsoleSession};
use crate::signup::SignupFlow;
use crate::{AutomationError, Browser};

pub const CLOSE_PROMPT: &str = "Press Enter to close the browser... ";

/// Something that can start a fresh browser session
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Browser, AutomationError>;
}

/// Starts a local Chromium for every session
pub struct ChromiumLauncher {
    options: BrowserOptions,
}

impl ChromiumLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Browser, AutomationError> {
        Browser::launch(&self.options).await
    }
}

/// Runs a closure against a freshly launched session and closes the session
/// afterwards, exactly once.
pub struct ScopedSession<'a> {
    launcher: &'a dyn SessionLauncher,
    failure_screenshot: Option<PathBuf>,
    pause_with: Option<&'a dyn HumanInterface>,
}

impl<'a> ScopedSession<'a> {
    pub fn new(launcher: &'a dyn SessionLauncher) -> Self {
        Self {
            launcher,
            failure_screenshot: None,
            pause_with: None,
        }
    }

    /// Save a PNG of the page here if the closure fails
    pub fn with_failure_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_screenshot = Some(path.into());
        self
    }

    /// Keep the window open until the operator confirms
    pub fn with_pause_before_close(mut self, human: &'a dyn HumanInterface) -> Self {
        self.pause_with = Some(human);
        self
    }

    pub async fn run<T, F, Fut>(&self, body: F) -> Result<T, AutomationError>
    where
        F: FnOnce(Browser) -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        let browser = self.launcher.launch().await?;
        let result = body(browser.clone()).await;

        if let (Err(e), Some(path)) = (&result, &self.failure_screenshot) {
            error!("Session failed: {}", e);
            capture_screenshot(&browser, path).await;
        }
        if let Some(human) = self.pause_with {
            if let Err(e) = human.ask(CLOSE_PROMPT).await {
                warn!("Not pausing before close: {}", e);
            }
        }
        if let Err(e) = browser.close().await {
            warn!("Failed to close the browser session: {}", e);
        }
        result
    }
}

async fn capture_screenshot(browser: &Browser, path: &Path) {
    match browser.screenshot().await {
        Ok(png) => match write_private(path, &png) {
            Ok(()) => info!("Saved failure screenshot to {}", path.display()),
            Err(e) => warn!("Failed to write screenshot {}: {}", path.display(), e),
        },
        Err(e) => warn!("Failed to capture screenshot: {}", e),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Where the credential file (and any failure screenshot) goes
    pub output_dir: PathBuf,
    /// Mint an access key once the signup is through
    pub create_key: bool,
    /// Hold the signup browser open until the operator presses Enter
    pub pause_before_exit: bool,
}

#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub credentials: Credentials,
    pub credentials_path: PathBuf,
    pub access_key: Option<AccessKey>,
}

/// Generate and save credentials, run the signup, and optionally mint a key.
///
/// The credential file is on disk before any browser starts.
#[instrument(skip_all)]
pub async fn provision_root_account(
    config: &ProvisionerConfig,
    launcher: &dyn SessionLauncher,
    human: &dyn HumanInterface,
    options: &ProvisionOptions,
) -> Result<ProvisionOutcome, AutomationError> {
    let credentials = generate_credentials(&config.account_credentials);
    let credentials_path = save_credentials(&credentials, &options.output_dir)?;

    let screenshot = options
        .output_dir
        .join(format!("failure-{}.png", credentials.account_name));
    let mut session = ScopedSession::new(launcher).with_failure_screenshot(screenshot);
    if options.pause_before_exit {
        session = session.with_pause_before_close(human);
    }

    let creds = &credentials;
    session
        .run(|browser| async move {
            let mut flow = SignupFlow::new(&browser, human, config, creds);
            let result = flow.run().await;
            if let Err(e) = &result {
                error!(step = %flow.step(), "Signup stopped: {}", e);
            }
            result
        })
        .await?;

    let access_key = if options.create_key {
        Some(create_root_access_key(&credentials, &config.timeouts, launcher, &options.output_dir).await?)
    } else {
        None
    };

    Ok(ProvisionOutcome {
        credentials,
        credentials_path,
        access_key,
    })
}

/// Sign in as root in a new session and mint an access key, then hold it
/// back for the propagation delay before handing it out.
#[instrument(skip_all, fields(account_name = %credentials.account_name))]
pub async fn create_root_access_key(
    credentials: &Credentials,
    timeouts: &Timeouts,
    launcher: &dyn SessionLauncher,
    output_dir: &Path,
) -> Result<AccessKey, AutomationError> {
    let screenshot = output_dir.join(format!("failure-{}-console.png", credentials.account_name));
    let key = ScopedSession::new(launcher)
        .with_failure_screenshot(screenshot)
        .run(|browser| async move {
            let console = RootConsoleSession::new(browser, timeouts.clone());
            console.log_in(credentials).await?;
            console.create_access_key().await
        })
        .await?;

    let delay = timeouts.propagation_delay();
    info!("Waiting {:?} for the key to propagate", delay);
    tokio::time::sleep(delay).await;
    Ok(key)
}
