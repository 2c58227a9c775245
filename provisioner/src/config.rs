//! Operator configuration
//!
//! One YAML document with the account templates and the contact, billing
//! and identity details the signup form asks for. Every field the flow
//! types into the console is required here, so a missing key fails at load
//! time instead of halfway through the signup.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::credentials::SUFFIX_TOKEN;
use crate::platforms::BrowserOptions;
use crate::AutomationError;

pub const DEFAULT_CONFIG_FILE: &str = "root_user_config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionerConfig {
    pub account_credentials: AccountTemplates,
    pub contact_information: ContactInformation,
    pub billing_information: BillingInformation,
    pub identity_verification: IdentityVerificationInfo,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub browser: BrowserOptions,
}

/// Templates for the generated identifiers; each carries one `{suffix}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountTemplates {
    pub email_address: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactInformation {
    pub name: String,
    pub phone_country_code: String,
    pub phone_number: String,
    pub country: String,
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingInformation {
    pub card_number: Sensitive,
    pub card_expiry_month: String,
    pub card_expiry_year: String,
    pub card_holder_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityVerificationInfo {
    pub phone_country_code: String,
    pub phone_number: String,
}

/// Wait bounds, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Ordinary page transitions
    pub default_secs: u64,
    /// Transitions that may wait on the operator doing something in the
    /// browser window (risk challenges, card authentication, sign-in CAPTCHA)
    pub human_input_secs: u64,
    /// Probes for pages that only sometimes appear
    pub probe_secs: u64,
    /// Pause after minting an access key before it is handed out
    pub propagation_delay_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_secs: 60,
            human_input_secs: 600,
            probe_secs: 10,
            propagation_delay_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    pub fn human_input(&self) -> Duration {
        Duration::from_secs(self.human_input_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_secs(self.propagation_delay_secs)
    }
}

/// A string that never shows up in `Debug` output or logs
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sensitive(***)")
    }
}

impl ProvisionerConfig {
    /// `~/.aws/root_user_config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".aws").join(DEFAULT_CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        Self::from_yaml_str(&read_config(path)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, AutomationError> {
        let config: ProvisionerConfig = serde_yaml::from_str(raw)
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;
        config.account_credentials.validate()?;
        Ok(config)
    }
}

impl AccountTemplates {
    /// Read only `account_credentials` from a configuration file. The
    /// contact and billing sections may be missing.
    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        Self::from_yaml_str(&read_config(path)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, AutomationError> {
        #[derive(Deserialize)]
        struct Section {
            account_credentials: AccountTemplates,
        }

        let section: Section = serde_yaml::from_str(raw)
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;
        section.account_credentials.validate()?;
        Ok(section.account_credentials)
    }

    fn validate(&self) -> Result<(), AutomationError> {
        for (key, template) in [
            ("account_credentials.email_address", &self.email_address),
            ("account_credentials.account_name", &self.account_name),
        ] {
            let tokens = template.matches(SUFFIX_TOKEN).count();
            if tokens != 1 {
                return Err(AutomationError::Configuration(format!(
                    "{key} must contain exactly one {SUFFIX_TOKEN} token, found {tokens}"
                )));
            }
        }
        Ok(())
    }
}

/// What a browser session needs and nothing more: enough to sign in to an
/// account that already exists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub browser: BrowserOptions,
}

impl SessionSettings {
    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        Self::from_yaml_str(&read_config(path)?)
    }

    /// An empty document, or one with only comments, gives the defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, AutomationError> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(|e| AutomationError::Configuration(e.to_string()))
    }
}

fn read_config(path: &Path) -> Result<String, AutomationError> {
    debug!("Loading configuration from {}", path.display());
    std::fs::read_to_string(path)
        .map_err(|e| AutomationError::Configuration(format!("cannot read {}: {e}", path.display())))
}
