//! Signup flow against a scripted page

use serde_json::json;

use super::{challenge_png, init_tracing, png_data_url, test_config, FakePage, ScriptedHuman};
use crate::captcha::CAPTCHA_PROMPT;
use crate::signup::{
    EMAIL_CODE_PROMPT, SIGNUP_URL, SMS_CHOICE_PROMPT, SMS_CODE_PROMPT,
};
use crate::{AutomationError, Credentials, SignupFlow, SignupStep, VerificationMethod};

fn credentials() -> Credentials {
    Credentials {
        account_name: "isme-root-abcdef".to_string(),
        email_address: "isme+root-abcdef@example.com".to_string(),
        password: "P@ss1234wordX".to_string(),
    }
}

fn identity_page() -> FakePage {
    let page = FakePage::permissive();
    page.set_body_text(&format!(
        "Confirm your identity\n{SMS_CHOICE_PROMPT}\nText message (SMS)\nVoice call"
    ));
    page
}

#[test]
fn test_verification_method_detection() {
    assert_eq!(
        VerificationMethod::detect(&format!("Step 4 of 5\n{SMS_CHOICE_PROMPT}")),
        VerificationMethod::Sms
    );
    assert_eq!(
        VerificationMethod::detect("We will call you now. Keep this page open."),
        VerificationMethod::Call
    );
}

#[tokio::test]
async fn test_full_signup_without_security_check() {
    init_tracing();
    let page = identity_page();
    page.hide("text:Security check");
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    let browser = page.browser();
    let human = ScriptedHuman::new(["123456", "x7kq2", "654321"]);
    let config = test_config();
    let credentials = credentials();

    let mut flow = SignupFlow::new(&browser, &human, &config, &credentials);
    flow.run().await.unwrap();
    assert_eq!(flow.step(), SignupStep::Done);

    assert_eq!(
        human.prompts(),
        vec![EMAIL_CODE_PROMPT, CAPTCHA_PROMPT, SMS_CODE_PROMPT]
    );
    assert_eq!(human.displayed_count(), 1);

    assert_eq!(
        page.value_of("name:emailAddress").as_deref(),
        Some("isme+root-abcdef@example.com")
    );
    assert_eq!(page.value_of("name:fullName").as_deref(), Some("isme-root-abcdef"));
    assert_eq!(page.value_of("name:otp").as_deref(), Some("123456"));
    assert_eq!(page.value_of("name:password").as_deref(), Some("P@ss1234wordX"));
    assert_eq!(page.value_of("name:rePassword").as_deref(), Some("P@ss1234wordX"));
    assert_eq!(page.value_of("name:address.postalCode").as_deref(), Some("28013"));
    assert_eq!(page.value_of("name:address.addressLine2").as_deref(), Some(""));
    assert_eq!(page.value_of("name:cardNumber").as_deref(), Some("4111111111111111"));
    assert_eq!(page.value_of("name:captchaGuess").as_deref(), Some("x7kq2"));
    assert_eq!(page.value_of("name:smsPin").as_deref(), Some("654321"));
    assert!(page.is_selected("name:agreement"));

    let actions = page.actions();
    assert_eq!(actions[0], format!("navigate {SIGNUP_URL}"));
    let submits: Vec<&str> = actions
        .iter()
        .filter_map(|a| a.strip_prefix("submit button:"))
        .collect();
    assert_eq!(
        submits,
        vec![
            "Verify email address",
            "Verify",
            "Continue",
            "Continue",
            "Continue",
            "Send SMS",
            "Continue",
            "Complete sign up",
        ]
    );
    // Continue is never a pointer click
    assert!(!actions.iter().any(|a| a.starts_with("click button:")));
}

#[tokio::test]
async fn test_security_check_is_solved_when_shown() {
    let page = identity_page();
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    let browser = page.browser();
    let human = ScriptedHuman::new(["123456", "first", "second", "654321"]);
    let config = test_config();
    let credentials = credentials();

    let mut flow = SignupFlow::new(&browser, &human, &config, &credentials);
    flow.run().await.unwrap();

    assert_eq!(
        human.prompts(),
        vec![EMAIL_CODE_PROMPT, CAPTCHA_PROMPT, CAPTCHA_PROMPT, SMS_CODE_PROMPT]
    );
    assert_eq!(human.displayed_count(), 2);
    // The field is cleared before the second answer goes in
    assert_eq!(page.value_of("name:captchaGuess").as_deref(), Some("second"));
}

#[tokio::test]
async fn test_sms_branch_is_taken_when_offered() {
    let page = identity_page();
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    let browser = page.browser();
    let human = ScriptedHuman::new(["x7kq2", "654321"]);
    let config = test_config();
    let credentials = credentials();

    let flow = SignupFlow::new(&browser, &human, &config, &credentials);
    let method = flow.confirm_identity().await.unwrap();

    assert_eq!(method, VerificationMethod::Sms);
    assert_eq!(page.value_of("name:phoneNumber").as_deref(), Some("600000000"));
    assert!(page
        .actions()
        .contains(&"submit button:Send SMS".to_string()));
}

#[tokio::test]
async fn test_call_branch_is_unsupported() {
    let page = FakePage::permissive();
    page.set_body_text("Confirm your identity\nWe are calling you now");
    let browser = page.browser();
    let human = ScriptedHuman::default();
    let config = test_config();
    let credentials = credentials();

    let flow = SignupFlow::new(&browser, &human, &config, &credentials);
    let result = flow.confirm_identity().await;

    assert!(matches!(result, Err(AutomationError::UnsupportedVariant(_))));
    assert!(human.prompts().is_empty());
    assert!(page
        .actions()
        .iter()
        .all(|a| !a.starts_with("type ") && !a.starts_with("submit ")));
}

#[tokio::test]
async fn test_failed_step_is_reported() {
    let page = identity_page();
    page.hide("text:Security check");
    page.hide("text:Contact Information");
    let browser = page.browser();
    let human = ScriptedHuman::new(["123456"]);
    let config = test_config();
    let credentials = credentials();

    let mut flow = SignupFlow::new(&browser, &human, &config, &credentials);
    let result = flow.run().await;

    assert!(matches!(result, Err(AutomationError::Timeout(_))));
    assert_eq!(flow.step(), SignupStep::ContactInformation);
    assert_eq!(page.value_of("name:address.fullName"), None);
}

#[tokio::test]
async fn test_missing_field_is_element_not_found() {
    let page = FakePage::permissive();
    page.hide("name:fullName");
    let browser = page.browser();
    let human = ScriptedHuman::default();
    let config = test_config();
    let credentials = credentials();

    let mut flow = SignupFlow::new(&browser, &human, &config, &credentials);
    let result = flow.run().await;

    assert!(matches!(result, Err(AutomationError::ElementNotFound(_))));
    assert_eq!(flow.step(), SignupStep::SubmitIdentity);
}
