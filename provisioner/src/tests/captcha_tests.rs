//! Tests for challenge extraction

use std::time::Duration;

use serde_json::json;

use super::{blank_png, challenge_png, png_data_url, FakePage, ScriptedHuman};
use crate::captcha::{data_url_is_empty, decode_data_url, CAPTCHA_PROMPT};
use crate::{AutomationError, CaptchaSolver, ChallengeImage, ChallengeSource, Selector};

fn canvas() -> Selector {
    Selector::Id("captchaCanvas".to_string())
}

fn image() -> Selector {
    Selector::Path("//img[contains(@src, 'captcha')]".to_string())
}

#[test]
fn test_blank_image_has_no_content() {
    assert!(!ChallengeImage::from_bytes(blank_png())
        .unwrap()
        .has_content()
        .unwrap());
    let drawn = ChallengeImage::from_bytes(challenge_png()).unwrap();
    assert!(drawn.has_content().unwrap());
    assert_eq!(drawn.extension(), "png");
}

#[test]
fn test_decode_data_url() {
    let png = challenge_png();
    assert_eq!(decode_data_url(&png_data_url(&png)).unwrap(), png);
    assert!(matches!(
        decode_data_url("data:image/png,plain"),
        Err(AutomationError::InvalidArgument(_))
    ));
    assert!(decode_data_url("https://example.com/captcha.png").is_err());
}

#[tokio::test]
async fn test_canvas_waits_until_drawn() {
    let page = FakePage::permissive();
    let browser = page.browser();
    page.queue_function_result(json!(png_data_url(&blank_png())));
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    let human = ScriptedHuman::new(["x7kq2"]);

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(5));
    let answer = solver.solve(&ChallengeSource::Canvas(canvas())).await.unwrap();

    assert_eq!(answer, "x7kq2");
    assert_eq!(human.displayed_count(), 1);
    assert_eq!(human.displayed.lock().unwrap()[0].bytes, challenge_png());
    assert_eq!(human.prompts(), vec![CAPTCHA_PROMPT.to_string()]);
    let calls = page
        .actions()
        .iter()
        .filter(|a| a.starts_with("call "))
        .count();
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn test_canvas_that_stays_blank_times_out() {
    let page = FakePage::permissive();
    let browser = page.browser();
    for _ in 0..8 {
        page.queue_function_result(json!(png_data_url(&blank_png())));
    }
    let human = ScriptedHuman::new(["never asked"]);

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_millis(400));
    let result = solver.solve(&ChallengeSource::Canvas(canvas())).await;

    assert!(matches!(result, Err(AutomationError::Timeout(_))));
    assert!(human.prompts().is_empty());
}

#[tokio::test]
async fn test_image_source_reads_data_src() {
    let page = FakePage::permissive();
    let browser = page.browser();
    page.set_attribute(image(), "src", &png_data_url(&challenge_png()));
    let human = ScriptedHuman::new(["abc"]);

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(1));
    let image = solver.extract(&ChallengeSource::Image(image())).await.unwrap();
    assert_eq!(image.bytes, challenge_png());
}

#[tokio::test]
async fn test_detect_prefers_canvas() {
    let page = FakePage::explicit();
    let browser = page.browser();
    let human = ScriptedHuman::default();
    let solver = CaptchaSolver::new(&browser, &human, Duration::from_millis(300));

    let result = solver.detect(canvas(), image()).await;
    assert!(matches!(result, Err(AutomationError::Timeout(_))), "{result:?}");

    page.show(image());
    assert_eq!(
        solver.detect(canvas(), image()).await.unwrap(),
        ChallengeSource::Image(image())
    );
    page.show(canvas());
    assert_eq!(
        solver.detect(canvas(), image()).await.unwrap(),
        ChallengeSource::Canvas(canvas())
    );
}

#[tokio::test]
async fn test_detect_waits_for_late_widget() {
    let page = FakePage::explicit();
    let browser = page.browser();
    let human = ScriptedHuman::default();

    let later = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        later.show(canvas());
    });

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(5));
    assert_eq!(
        solver.detect(canvas(), image()).await.unwrap(),
        ChallengeSource::Canvas(canvas())
    );
}

#[tokio::test]
async fn test_detect_stops_on_dead_connection() {
    let page = FakePage::explicit();
    let browser = page.browser();
    page.disconnect("CDP error: channel closed");
    let human = ScriptedHuman::default();

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(5));
    let result = solver.detect(canvas(), image()).await;
    assert!(matches!(result, Err(AutomationError::PlatformError(_))));
    assert_eq!(page.lookups(), 1);
}

#[tokio::test]
async fn test_empty_canvas_data_url_is_not_drawn_yet() {
    let page = FakePage::permissive();
    let browser = page.browser();
    page.queue_function_result(json!("data:,"));
    page.queue_function_result(json!(png_data_url(&challenge_png())));
    let human = ScriptedHuman::new(["x7kq2"]);

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(5));
    let answer = solver.solve(&ChallengeSource::Canvas(canvas())).await.unwrap();

    assert_eq!(answer, "x7kq2");
    assert_eq!(human.displayed.lock().unwrap()[0].bytes, challenge_png());
}

#[tokio::test]
async fn test_image_waits_for_src() {
    let page = FakePage::explicit();
    let browser = page.browser();
    page.show(image());
    let human = ScriptedHuman::default();

    let later = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        later.set_attribute(image(), "src", &png_data_url(&challenge_png()));
    });

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_secs(5));
    let captured = solver.extract(&ChallengeSource::Image(image())).await.unwrap();
    assert_eq!(captured.bytes, challenge_png());
}

#[tokio::test]
async fn test_image_without_src_times_out() {
    let page = FakePage::explicit();
    let browser = page.browser();
    page.show(image());
    page.set_attribute(image(), "src", "");
    let human = ScriptedHuman::default();

    let solver = CaptchaSolver::new(&browser, &human, Duration::from_millis(300));
    let result = solver.extract(&ChallengeSource::Image(image())).await;
    assert!(matches!(result, Err(AutomationError::Timeout(_))), "{result:?}");
}

#[test]
fn test_data_url_is_empty() {
    assert!(data_url_is_empty("data:,"));
    assert!(data_url_is_empty("data:image/png;base64,"));
    assert!(!data_url_is_empty(&png_data_url(&challenge_png())));
    assert!(!data_url_is_empty("https://example.com/captcha.png"));
}
