//! CAPTCHA extraction and hand-off to the operator
//!
//! The console renders challenges either on a `<canvas>` or as a plain
//! `<img>`. Both are read back as encoded image bytes, but only once the
//! widget has drawn something: a capture taken too early is a blank image.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::human::HumanInterface;
use crate::locator::{is_transient, POLL_INTERVAL};
use crate::{AutomationError, Browser, PageElement, Selector};

pub const CAPTCHA_PROMPT: &str = "Type the characters shown above: ";

const CANVAS_TO_DATA_URL: &str = "function() { return this.toDataURL('image/png'); }";

/// Where the challenge image lives on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeSource {
    /// A canvas widget, read through `toDataURL`
    Canvas(Selector),
    /// An image element, read through its `src`
    Image(Selector),
}

impl ChallengeSource {
    fn selector(&self) -> &Selector {
        match self {
            ChallengeSource::Canvas(s) | ChallengeSource::Image(s) => s,
        }
    }
}

/// An encoded challenge image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ChallengeImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AutomationError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| AutomationError::PlatformError(format!("unrecognised challenge image: {e}")))?;
        Ok(Self { bytes, format })
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    /// Whether the image holds more than one colour. A canvas that has not
    /// been drawn yet serialises as a single transparent fill.
    pub fn has_content(&self) -> Result<bool, AutomationError> {
        let decoded = image::load_from_memory_with_format(&self.bytes, self.format)
            .map_err(|e| AutomationError::PlatformError(format!("challenge image decode: {e}")))?
            .to_rgba8();
        let mut pixels = decoded.pixels();
        let Some(first) = pixels.next() else {
            return Ok(false);
        };
        Ok(pixels.any(|p| p != first))
    }
}

/// A data URL without a payload, as `toDataURL` gives for an empty canvas
pub fn data_url_is_empty(url: &str) -> bool {
    url.strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .is_some_and(|(_, payload)| payload.trim().is_empty())
}

/// Decode a `data:<mime>;base64,<payload>` URL into raw bytes
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, AutomationError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AutomationError::InvalidArgument("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AutomationError::InvalidArgument("data URL has no payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AutomationError::InvalidArgument(format!(
            "unsupported data URL encoding: {meta}"
        )));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AutomationError::InvalidArgument(format!("data URL payload: {e}")))
}

pub struct CaptchaSolver<'a> {
    browser: &'a Browser,
    human: &'a dyn HumanInterface,
    render_timeout: Duration,
}

impl<'a> CaptchaSolver<'a> {
    pub fn new(browser: &'a Browser, human: &'a dyn HumanInterface, render_timeout: Duration) -> Self {
        Self {
            browser,
            human,
            render_timeout,
        }
    }

    /// Wait for either widget and pick the one that shows up, preferring the
    /// canvas when both are there.
    pub async fn detect(
        &self,
        canvas: Selector,
        image: Selector,
    ) -> Result<ChallengeSource, AutomationError> {
        let deadline = Instant::now() + self.render_timeout;
        loop {
            for source in [
                ChallengeSource::Canvas(canvas.clone()),
                ChallengeSource::Image(image.clone()),
            ] {
                match self.browser.locator(source.selector().clone()).first().await {
                    Ok(_) => {
                        debug!(?source, "Challenge widget found");
                        return Ok(source);
                    }
                    Err(e) if is_transient(&e) => {}
                    Err(e) => return Err(e),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "neither {canvas} nor {image} appeared within {:?}",
                    self.render_timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Show the challenge to the operator and return their answer.
    #[instrument(skip(self), fields(source = %source.selector()))]
    pub async fn solve(&self, source: &ChallengeSource) -> Result<String, AutomationError> {
        let image = self.extract(source).await?;
        self.human.display(&image).await?;
        let answer = self.human.ask(CAPTCHA_PROMPT).await?;
        info!("CAPTCHA answer received");
        Ok(answer)
    }

    /// Read the challenge image, waiting until it has finished rendering.
    pub async fn extract(&self, source: &ChallengeSource) -> Result<ChallengeImage, AutomationError> {
        let deadline = Instant::now() + self.render_timeout;
        let element = self
            .browser
            .locator(source.selector().clone())
            .wait(Some(self.render_timeout))
            .await?;

        loop {
            match self.capture(source, &element).await? {
                Some(image) if image.has_content()? => {
                    debug!(bytes = image.bytes.len(), "Captured challenge image");
                    return Ok(image);
                }
                _ => debug!("Challenge not drawn yet"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "challenge at {} was still blank after {:?}",
                    source.selector(),
                    self.render_timeout
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// One read of the widget. `None` while there is nothing to decode yet:
    /// a zero-sized canvas serialises as `data:,` and an image may still be
    /// waiting for its `src`.
    async fn capture(
        &self,
        source: &ChallengeSource,
        element: &PageElement,
    ) -> Result<Option<ChallengeImage>, AutomationError> {
        let bytes = match source {
            ChallengeSource::Canvas(_) => {
                let data_url = element.call_function(CANVAS_TO_DATA_URL).await?;
                let data_url = data_url.as_str().ok_or_else(|| {
                    AutomationError::PlatformError("canvas did not return a data URL".to_string())
                })?;
                if data_url_is_empty(data_url) {
                    return Ok(None);
                }
                decode_data_url(data_url)?
            }
            ChallengeSource::Image(_) => match element.attribute("src").await? {
                Some(src) if !src.trim().is_empty() && !data_url_is_empty(&src) => {
                    self.fetch_image(src.trim()).await?
                }
                _ => return Ok(None),
            },
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        ChallengeImage::from_bytes(bytes).map(Some)
    }

    async fn fetch_image(&self, src: &str) -> Result<Vec<u8>, AutomationError> {
        if src.starts_with("data:") {
            return decode_data_url(src);
        }
        let url = match self.browser.current_url().await? {
            Some(base) => reqwest::Url::parse(&base).and_then(|base| base.join(src)),
            None => reqwest::Url::parse(src),
        }
        .map_err(|e| AutomationError::InvalidArgument(format!("challenge image URL {src}: {e}")))?;

        debug!(%url, "Fetching challenge image");
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AutomationError::PlatformError(format!("challenge image fetch: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("challenge image body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
