mod captcha_tests;
mod signup_tests;
mod workflow_tests;

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::captcha::ChallengeImage;
use crate::{AutomationError, HumanInterface, ProvisionerConfig};

pub use fake_page::{FakeLauncher, FakePage};

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

pub const TEST_CONFIG: &str = r#"
account_credentials:
  email_address: "isme+root-{suffix}@example.com"
  account_name: "isme-root-{suffix}"
contact_information:
  name: "Iain Elder"
  phone_country_code: "Spain (+34)"
  phone_number: "600000000"
  country: "Spain"
  address_line_1: "Calle Mayor 1"
  city: "Madrid"
  state: "Madrid"
  postal_code: "28013"
billing_information:
  card_number: "4111111111111111"
  card_expiry_month: "12"
  card_expiry_year: "2030"
  card_holder_name: "IAIN ELDER"
identity_verification:
  phone_country_code: "Spain (+34)"
  phone_number: "600000000"
timeouts:
  default_secs: 1
  human_input_secs: 1
  probe_secs: 0
  propagation_delay_secs: 0
"#;

pub fn test_config() -> ProvisionerConfig {
    ProvisionerConfig::from_yaml_str(TEST_CONFIG).unwrap()
}

fn encode_png(image: RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A small two-tone PNG, as a drawn challenge looks
pub fn challenge_png() -> Vec<u8> {
    encode_png(RgbaImage::from_fn(8, 4, |x, _| {
        if x < 4 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    }))
}

/// A transparent PNG, as an undrawn canvas serialises
pub fn blank_png() -> Vec<u8> {
    encode_png(RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 0])))
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Answers prompts from a script and records what it was asked
#[derive(Default)]
pub struct ScriptedHuman {
    answers: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub displayed: Mutex<Vec<ChallengeImage>>,
}

impl ScriptedHuman {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn displayed_count(&self) -> usize {
        self.displayed.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl HumanInterface for ScriptedHuman {
    async fn display(&self, image: &ChallengeImage) -> Result<(), AutomationError> {
        self.displayed.lock().unwrap().push(image.clone());
        Ok(())
    }

    async fn ask(&self, prompt: &str) -> Result<String, AutomationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers.lock().unwrap().pop_front().ok_or_else(|| {
            AutomationError::HumanInteraction(format!("no scripted answer for {prompt:?}"))
        })
    }
}
