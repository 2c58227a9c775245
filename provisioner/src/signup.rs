//! The root account signup flow
//!
//! A linear walk through the signup console with one fork at identity
//! verification. Each step waits for its page's waypoint, fills the page's
//! fields and submits. Nothing is retried: the first failure ends the run
//! and [`SignupFlow::step`] reports where.

use std::fmt;

use tracing::{info, instrument};

use crate::captcha::{CaptchaSolver, ChallengeSource};
use crate::config::ProvisionerConfig;
use crate::credentials::Credentials;
use crate::forms::{hit_continue, set_checkbox, set_dropdown, set_radio, set_text};
use crate::human::HumanInterface;
use crate::{AutomationError, Browser, PageWaypoint, Selector};

pub const SIGNUP_URL: &str = "https://portal.aws.amazon.com/billing/signup";

/// Shown above the method choice when the console lets the caller pick SMS
pub const SMS_CHOICE_PROMPT: &str = "How should we send you the verification code?";

pub const EMAIL_CODE_PROMPT: &str = "Email verification code: ";
pub const SMS_CODE_PROMPT: &str = "Verify code: ";

// Page markers, in flow order
pub const SIGNUP_MARKER: &str = "Sign up for AWS";
pub const EMAIL_CONFIRMATION_MARKER: &str = "Confirm you are you";
pub const PASSWORD_MARKER: &str = "Create your password";
pub const IDENTIFIER_CAPTCHA_MARKER: &str = "Security check";
pub const CONTACT_MARKER: &str = "Contact Information";
pub const BILLING_MARKER: &str = "Billing Information";
pub const IDENTITY_MARKER: &str = "Confirm your identity";
pub const SMS_CODE_MARKER: &str = "Verify code";
pub const SUPPORT_PLAN_MARKER: &str = "Select a support plan";

const CAPTCHA_CANVAS_ID: &str = "captchaCanvas";
const CAPTCHA_IMAGE_XPATH: &str = "//img[contains(@src, 'captcha') or contains(@alt, 'captcha')]";
const CAPTCHA_GUESS_FIELD: &str = "name:captchaGuess";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStep {
    VisitSignupPage,
    SubmitIdentity,
    EmailConfirmation,
    SetPassword,
    IdentifierCaptcha,
    ContactInformation,
    BillingInformation,
    IdentityVerification,
    SupportPlanSelection,
    Done,
}

impl fmt::Display for SignupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// How the console delivers the phone verification code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    Sms,
    /// The console calls the number and the caller keys in a PIN. Not driven.
    Call,
}

impl VerificationMethod {
    /// The console only offers a choice some of the time; without the
    /// choice prompt it insists on calling.
    pub fn detect(page_text: &str) -> Self {
        if page_text.contains(SMS_CHOICE_PROMPT) {
            VerificationMethod::Sms
        } else {
            VerificationMethod::Call
        }
    }

    /// Radio label for the method
    pub fn label(&self) -> &'static str {
        match self {
            VerificationMethod::Sms => "Text message (SMS)",
            VerificationMethod::Call => "Voice call",
        }
    }
}

pub struct SignupFlow<'a> {
    browser: &'a Browser,
    human: &'a dyn HumanInterface,
    config: &'a ProvisionerConfig,
    credentials: &'a Credentials,
    step: SignupStep,
}

impl<'a> SignupFlow<'a> {
    pub fn new(
        browser: &'a Browser,
        human: &'a dyn HumanInterface,
        config: &'a ProvisionerConfig,
        credentials: &'a Credentials,
    ) -> Self {
        Self {
            browser,
            human,
            config,
            credentials,
            step: SignupStep::VisitSignupPage,
        }
    }

    /// The step in progress, or the one that failed
    pub fn step(&self) -> SignupStep {
        self.step
    }

    /// Drive the flow to the end.
    #[instrument(skip(self), fields(account_name = %self.credentials.account_name))]
    pub async fn run(&mut self) -> Result<(), AutomationError> {
        while self.step != SignupStep::Done {
            info!(step = %self.step, "Signup step");
            self.step = self.advance().await?;
        }
        info!("Signup complete");
        Ok(())
    }

    /// Run the current step and return the next one
    async fn advance(&self) -> Result<SignupStep, AutomationError> {
        let next = match self.step {
            SignupStep::VisitSignupPage => {
                self.browser.navigate(SIGNUP_URL).await?;
                SignupStep::SubmitIdentity
            }
            SignupStep::SubmitIdentity => {
                self.submit_account_identity().await?;
                SignupStep::EmailConfirmation
            }
            SignupStep::EmailConfirmation => {
                self.submit_email_confirmation().await?;
                SignupStep::SetPassword
            }
            SignupStep::SetPassword => {
                self.submit_account_password().await?;
                SignupStep::IdentifierCaptcha
            }
            SignupStep::IdentifierCaptcha => {
                self.solve_identifier_captcha().await?;
                SignupStep::ContactInformation
            }
            SignupStep::ContactInformation => {
                self.submit_contact_information().await?;
                SignupStep::BillingInformation
            }
            SignupStep::BillingInformation => {
                self.submit_billing_information().await?;
                SignupStep::IdentityVerification
            }
            SignupStep::IdentityVerification => {
                self.confirm_identity().await?;
                SignupStep::SupportPlanSelection
            }
            SignupStep::SupportPlanSelection => {
                self.select_support_plan().await?;
                SignupStep::Done
            }
            SignupStep::Done => SignupStep::Done,
        };
        Ok(next)
    }

    fn waypoint(&self, marker: &str) -> PageWaypoint {
        PageWaypoint::new(marker, self.config.timeouts.default_wait())
    }

    fn slow_waypoint(&self, marker: &str) -> PageWaypoint {
        PageWaypoint::new(marker, self.config.timeouts.human_input())
    }

    async fn submit_account_identity(&self) -> Result<(), AutomationError> {
        self.browser.wait_for(&self.waypoint(SIGNUP_MARKER)).await?;
        set_text(self.browser, "name:emailAddress", &self.credentials.email_address).await?;
        set_text(self.browser, "name:fullName", &self.credentials.account_name).await?;
        hit_continue(self.browser, "Verify email address").await
    }

    async fn submit_email_confirmation(&self) -> Result<(), AutomationError> {
        self.browser
            .wait_for(&self.waypoint(EMAIL_CONFIRMATION_MARKER))
            .await?;
        let code = self.human.ask(EMAIL_CODE_PROMPT).await?;
        set_text(self.browser, "name:otp", &code).await?;
        hit_continue(self.browser, "Verify").await
    }

    async fn submit_account_password(&self) -> Result<(), AutomationError> {
        self.browser.wait_for(&self.waypoint(PASSWORD_MARKER)).await?;
        set_text(self.browser, "name:password", &self.credentials.password).await?;
        set_text(self.browser, "name:rePassword", &self.credentials.password).await?;
        hit_continue(self.browser, "Continue").await
    }

    /// Risk scoring decides whether this page shows up at all. Returns
    /// whether a challenge was solved.
    pub async fn solve_identifier_captcha(&self) -> Result<bool, AutomationError> {
        let probe = PageWaypoint::new(IDENTIFIER_CAPTCHA_MARKER, self.config.timeouts.probe());
        if !self.browser.probe(&probe).await? {
            info!("No security check this time");
            return Ok(false);
        }

        let solver = self.solver();
        let source = solver
            .detect(
                Selector::Id(CAPTCHA_CANVAS_ID.to_string()),
                Selector::Path(CAPTCHA_IMAGE_XPATH.to_string()),
            )
            .await?;
        let guess = solver.solve(&source).await?;
        set_text(self.browser, CAPTCHA_GUESS_FIELD, &guess).await?;
        hit_continue(self.browser, "Continue").await?;
        Ok(true)
    }

    async fn submit_contact_information(&self) -> Result<(), AutomationError> {
        let info = &self.config.contact_information;
        self.browser
            .wait_for(&self.slow_waypoint(CONTACT_MARKER))
            .await?;
        set_radio(self.browser, "accountType", "Personal").await?;
        set_text(self.browser, "name:address.fullName", &info.name).await?;
        set_dropdown(self.browser, "address.phoneCode", &info.phone_country_code).await?;
        set_text(self.browser, "name:address.phoneNumber", &info.phone_number).await?;
        set_dropdown(self.browser, "address.country", &info.country).await?;
        set_text(self.browser, "name:address.addressLine1", &info.address_line_1).await?;
        set_text(self.browser, "name:address.addressLine2", &info.address_line_2).await?;
        set_text(self.browser, "name:address.city", &info.city).await?;
        set_text(self.browser, "name:address.state", &info.state).await?;
        set_text(self.browser, "name:address.postalCode", &info.postal_code).await?;
        set_checkbox(self.browser, "agreement", true).await?;
        hit_continue(self.browser, "Continue").await
    }

    async fn submit_billing_information(&self) -> Result<(), AutomationError> {
        let info = &self.config.billing_information;
        self.browser.wait_for(&self.waypoint(BILLING_MARKER)).await?;
        set_text(self.browser, "name:cardNumber", info.card_number.expose()).await?;
        set_dropdown(self.browser, "expirationMonth", &info.card_expiry_month).await?;
        set_dropdown(self.browser, "expirationYear", &info.card_expiry_year).await?;
        set_text(self.browser, "name:accountHolderName", &info.card_holder_name).await?;
        set_radio(self.browser, "addressType", "Use my contact address").await?;
        hit_continue(self.browser, "Continue").await
    }

    /// Pick the verification branch from the page text and run it.
    ///
    /// The call branch fails with `UnsupportedVariant` without touching the
    /// page.
    pub async fn confirm_identity(&self) -> Result<VerificationMethod, AutomationError> {
        // Card checks can hand the operator a bank challenge first
        self.browser
            .wait_for(&self.slow_waypoint(IDENTITY_MARKER))
            .await?;
        let method = VerificationMethod::detect(&self.browser.page_text().await?);
        info!(?method, "Identity verification method");
        match method {
            VerificationMethod::Sms => self.confirm_identity_by_sms().await?,
            VerificationMethod::Call => self.confirm_identity_by_call().await?,
        }
        Ok(method)
    }

    async fn confirm_identity_by_sms(&self) -> Result<(), AutomationError> {
        let info = &self.config.identity_verification;
        set_radio(self.browser, "divaMethod", VerificationMethod::Sms.label()).await?;
        set_dropdown(self.browser, "country", &info.phone_country_code).await?;
        set_text(self.browser, "name:phoneNumber", &info.phone_number).await?;

        let guess = self
            .solver()
            .solve(&ChallengeSource::Canvas(Selector::Id(
                CAPTCHA_CANVAS_ID.to_string(),
            )))
            .await?;
        set_text(self.browser, CAPTCHA_GUESS_FIELD, &guess).await?;
        hit_continue(self.browser, "Send SMS").await?;

        self.browser.wait_for(&self.waypoint(SMS_CODE_MARKER)).await?;
        let pin = self.human.ask(SMS_CODE_PROMPT).await?;
        set_text(self.browser, "name:smsPin", &pin).await?;
        hit_continue(self.browser, "Continue").await
    }

    async fn confirm_identity_by_call(&self) -> Result<(), AutomationError> {
        Err(AutomationError::UnsupportedVariant(
            "identity confirmation by voice call is not implemented".to_string(),
        ))
    }

    async fn select_support_plan(&self) -> Result<(), AutomationError> {
        self.browser
            .wait_for(&self.waypoint(SUPPORT_PLAN_MARKER))
            .await?;
        set_radio(self.browser, "awsui-tiles-6", "Basic").await?;
        hit_continue(self.browser, "Complete sign up").await
    }

    fn solver(&self) -> CaptchaSolver<'_> {
        CaptchaSolver::new(self.browser, self.human, self.config.timeouts.default_wait())
    }
}
