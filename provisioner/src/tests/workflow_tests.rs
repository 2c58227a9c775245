//! Session scoping and the end-to-end run

use serde_json::json;

use super::{challenge_png, png_data_url, test_config, FakeLauncher, FakePage, ScriptedHuman};
use crate::workflow::CLOSE_PROMPT;
use crate::{provision_root_account, AutomationError, Credentials, ProvisionOptions, ScopedSession};

#[tokio::test]
async fn test_session_closed_after_success() {
    let launcher = FakeLauncher::new(FakePage::permissive());
    let dir = tempfile::tempdir().unwrap();
    let screenshot = dir.path().join("failure.png");

    let value = ScopedSession::new(&launcher)
        .with_failure_screenshot(&screenshot)
        .run(|browser| async move {
            browser.navigate("https://example.com/").await?;
            Ok::<_, AutomationError>(42)
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(launcher.page.closes(), 1);
    assert_eq!(launcher.page.screenshots(), 0);
    assert!(!screenshot.exists());
}

#[tokio::test]
async fn test_session_closed_after_failure_with_screenshot() {
    let launcher = FakeLauncher::new(FakePage::permissive());
    let dir = tempfile::tempdir().unwrap();
    let screenshot = dir.path().join("failure.png");

    let result: Result<(), _> = ScopedSession::new(&launcher)
        .with_failure_screenshot(&screenshot)
        .run(|_browser| async move {
            Err(AutomationError::Timeout("Contact Information".to_string()))
        })
        .await;

    assert!(matches!(result, Err(AutomationError::Timeout(_))));
    assert_eq!(launcher.page.closes(), 1);
    assert_eq!(std::fs::read(&screenshot).unwrap(), challenge_png());
    assert_eq!(launcher.page.actions().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_session_pauses_before_close() {
    let launcher = FakeLauncher::new(FakePage::permissive());
    let human = ScriptedHuman::new([""]);

    ScopedSession::new(&launcher)
        .with_pause_before_close(&human)
        .run(|_browser| async move { Ok::<_, AutomationError>(()) })
        .await
        .unwrap();

    assert_eq!(human.prompts(), vec![CLOSE_PROMPT]);
    assert_eq!(launcher.page.closes(), 1);
}

#[tokio::test]
async fn test_provision_saves_credentials_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::permissive();
    page.set_body_text("How should we send you the verification code?");
    page.hide("text:Security check");
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    page.set_text_of("link:Hide >> ./ancestor::tr", "AKIAEXAMPLE\nSECRETEXAMPLE");
    let launcher = FakeLauncher::new(page).watching(dir.path());
    let human = ScriptedHuman::new(["123456", "x7kq2", "654321"]);
    let config = test_config();

    let options = ProvisionOptions {
        output_dir: dir.path().to_path_buf(),
        create_key: true,
        pause_before_exit: false,
    };
    let outcome = provision_root_account(&config, &launcher, &human, &options)
        .await
        .unwrap();

    assert_eq!(launcher.launches(), 2);
    assert_eq!(launcher.page.closes(), 2);
    assert_eq!(*launcher.files_at_launch.lock().unwrap(), vec![1, 1]);

    let saved = Credentials::load(&outcome.credentials_path).unwrap();
    assert_eq!(saved, outcome.credentials);
    assert!(outcome.credentials.account_name.starts_with("isme-root-"));
    assert_eq!(
        outcome.access_key.map(|k| k.access_key_id).as_deref(),
        Some("AKIAEXAMPLE")
    );
}

#[tokio::test]
async fn test_provision_failure_keeps_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::permissive();
    page.hide("text:Sign up for AWS");
    let launcher = FakeLauncher::new(page);
    let human = ScriptedHuman::default();
    let config = test_config();

    let options = ProvisionOptions {
        output_dir: dir.path().to_path_buf(),
        create_key: true,
        pause_before_exit: false,
    };
    let result = provision_root_account(&config, &launcher, &human, &options).await;

    assert!(matches!(result, Err(AutomationError::Timeout(_))));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(launcher.page.closes(), 1);

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("credentials-isme-root-"));
    assert!(names[1].starts_with("failure-isme-root-"));
}
