//! Root user session on the management console
//!
//! Runs in its own browser, separate from the signup flow, and authenticates
//! with the freshly generated root credentials to mint an access key.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::Timeouts;
use crate::credentials::Credentials;
use crate::forms::{hit_button, set_radio_value, set_text};
use crate::{AutomationError, Browser, PageWaypoint, Selector};

pub const CONSOLE_HOME_URL: &str = "https://us-east-1.console.aws.amazon.com/console/home";
pub const SECURITY_CREDENTIALS_URL: &str =
    "https://us-east-1.console.aws.amazon.com/iamv2/home?region=us-east-1#/security_credentials";

/// Long-term key ids issued to IAM identities start with this
pub const ACCESS_KEY_ID_PREFIX: &str = "AKIA";

const CREATE_ACCESS_KEY: &str = "Create access key";
const CONFIRM_CREATE_ACCESS_KEY: &str =
    "(//button[contains(span/text(), 'Create access key')])[last()]";
const RISK_ACKNOWLEDGEMENT: &str = "ack-risk";
const COOKIE_BANNER_ACCEPT: &str = "Accept all cookies";

/// Sign-in page account type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    RootUser,
    IamUser,
}

impl UserType {
    /// Radio input value on the sign-in page
    pub fn value(&self) -> &'static str {
        match self {
            UserType::RootUser => "rootUser",
            UserType::IamUser => "iamUser",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

impl AccessKey {
    /// `AccessKeyId,SecretAccessKey`, newline included
    pub fn to_line(&self) -> String {
        format!("{},{}\n", self.access_key_id, self.secret_access_key)
    }
}

/// Same shape as the `aws iam create-access-key` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccessKeyResponse {
    #[serde(rename = "AccessKey")]
    pub access_key: AccessKey,
}

impl From<AccessKey> for CreateAccessKeyResponse {
    fn from(access_key: AccessKey) -> Self {
        Self { access_key }
    }
}

/// Split the revealed key row into id and secret.
///
/// The row reads the id, the secret and then whatever else the table shows,
/// one cell per line.
pub fn parse_key_row(text: &str) -> Result<AccessKey, AutomationError> {
    let mut cells = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let (Some(access_key_id), Some(secret_access_key)) = (cells.next(), cells.next()) else {
        return Err(AutomationError::IntegrityViolation(
            "access key row does not hold both an id and a secret".to_string(),
        ));
    };
    if !access_key_id.starts_with(ACCESS_KEY_ID_PREFIX) {
        return Err(AutomationError::IntegrityViolation(format!(
            "access key id {access_key_id:?} does not start with {ACCESS_KEY_ID_PREFIX}"
        )));
    }
    Ok(AccessKey {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
    })
}

pub struct RootConsoleSession {
    browser: Browser,
    timeouts: Timeouts,
}

impl RootConsoleSession {
    pub fn new(browser: Browser, timeouts: Timeouts) -> Self {
        Self { browser, timeouts }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Sign in as the root user and land on the console home page.
    #[instrument(skip(self, credentials), fields(email = %credentials.email_address))]
    pub async fn log_in(&self, credentials: &Credentials) -> Result<(), AutomationError> {
        let browser = &self.browser;
        browser.navigate(CONSOLE_HOME_URL).await?;

        browser.wait_for(&self.waypoint("Sign in")).await?;
        set_radio_value(browser, "userType", UserType::RootUser.value()).await?;
        set_text(browser, Selector::Id("resolving_input".to_string()), &credentials.email_address)
            .await?;
        hit_button(browser, "Next").await?;

        // A sign-in CAPTCHA can sit between the two pages for the operator
        // to solve in the window
        browser
            .wait_for(&PageWaypoint::new("Root user sign in", self.timeouts.human_input()))
            .await?;
        set_text(browser, Selector::Id("password".to_string()), &credentials.password).await?;
        hit_button(browser, "Sign in").await?;

        browser
            .wait_for(&PageWaypoint::new("Console Home", self.timeouts.human_input()))
            .await?;
        info!("Signed in to the console");

        self.dismiss_cookie_banner().await;
        Ok(())
    }

    async fn dismiss_cookie_banner(&self) {
        let banner = self
            .browser
            .locator(Selector::Button(COOKIE_BANNER_ACCEPT.to_string()));
        match banner.first().await {
            Ok(button) => {
                if let Err(e) = button.click().await {
                    warn!("Failed to dismiss the cookie banner: {}", e);
                }
            }
            Err(_) => debug!("No cookie banner"),
        }
    }

    /// Mint a new access key for the signed-in root user and read it back.
    #[instrument(skip(self))]
    pub async fn create_access_key(&self) -> Result<AccessKey, AutomationError> {
        let browser = &self.browser;
        browser.navigate(SECURITY_CREDENTIALS_URL).await?;

        let create = browser
            .locator(Selector::Button(CREATE_ACCESS_KEY.to_string()))
            .wait_until_clickable(Some(self.timeouts.default_wait()))
            .await?;
        // The button sits below the fold and the sticky header swallows
        // clicks near the top edge
        create.scroll_into_view().await?;
        create.click().await?;

        browser
            .locator(Selector::Name(RISK_ACKNOWLEDGEMENT.to_string()))
            .wait(Some(self.timeouts.default_wait()))
            .await?
            .set_selected(true)
            .await?;
        browser
            .locator(Selector::Path(CONFIRM_CREATE_ACCESS_KEY.to_string()))
            .first()
            .await?
            .click()
            .await?;

        browser.wait_for(&self.waypoint("Retrieve access key")).await?;
        browser
            .locator(Selector::Link("Show".to_string()))
            .first()
            .await?
            .click()
            .await?;

        let row = browser
            .locator(Selector::Link("Hide".to_string()))
            .locator(Selector::Path("./ancestor::tr".to_string()))
            .wait(Some(self.timeouts.default_wait()))
            .await?
            .text()
            .await?;
        let key = parse_key_row(&row)?;
        info!(access_key_id = %key.access_key_id, "Created access key");
        Ok(key)
    }

    fn waypoint(&self, marker: &str) -> PageWaypoint {
        PageWaypoint::new(marker, self.timeouts.default_wait())
    }
}
