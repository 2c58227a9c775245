//! Typed setters for the console's form controls
//!
//! Setters look their control up once, without waiting: the caller has
//! already waited for the page's waypoint, so a missing control means the
//! layout changed and surfaces as `ElementNotFound`.

use tracing::debug;

use crate::selector::xpath_literal;
use crate::{AutomationError, Browser, Selector};

/// Replace the value of a text input. The value itself is never logged.
pub async fn set_text(
    browser: &Browser,
    selector: impl Into<Selector>,
    value: &str,
) -> Result<(), AutomationError> {
    let selector = selector.into();
    debug!(%selector, "Setting text");
    browser.locator(selector).first().await?.set_text(value).await
}

/// Open a custom `awsui-select` dropdown and pick the option with the given
/// label
pub async fn set_dropdown(
    browser: &Browser,
    dropdown_id: &str,
    option: &str,
) -> Result<(), AutomationError> {
    debug!(dropdown_id, option, "Selecting dropdown option");
    let dropdown = Selector::Path(format!(
        "//awsui-select[@id = {}]",
        xpath_literal(dropdown_id)
    ));
    browser.locator(dropdown).first().await?.click().await?;

    let option = Selector::Path(format!(
        "//*[contains(@id, 'dropdown-option')]//span[text() = {}]",
        xpath_literal(option)
    ));
    browser.locator(option).first().await?.click().await
}

/// Select the radio button named `input_name` whose label contains `label`
pub async fn set_radio(
    browser: &Browser,
    input_name: &str,
    label: &str,
) -> Result<(), AutomationError> {
    debug!(input_name, label, "Selecting radio button");
    let radio = Selector::Path(format!(
        "//div[@class = 'awsui-radio-button' and .//span[contains(text(), {})]]//input[@name = {}]",
        xpath_literal(label),
        xpath_literal(input_name)
    ));
    browser.locator(radio).first().await?.set_selected(true).await
}

/// Select the radio input named `input_name` carrying `value`
pub async fn set_radio_value(
    browser: &Browser,
    input_name: &str,
    value: &str,
) -> Result<(), AutomationError> {
    debug!(input_name, value, "Selecting radio value");
    let radio = Selector::Path(format!(
        "//input[@name = {} and @value = {}]",
        xpath_literal(input_name),
        xpath_literal(value)
    ));
    browser.locator(radio).first().await?.set_selected(true).await
}

/// Tick or untick a checkbox, touching it only if it is in the wrong state
pub async fn set_checkbox(
    browser: &Browser,
    input_name: &str,
    selected: bool,
) -> Result<(), AutomationError> {
    debug!(input_name, selected, "Setting checkbox");
    browser
        .locator(Selector::Name(input_name.to_string()))
        .first()
        .await?
        .set_selected(selected)
        .await
}

/// Submit the current form through the button labelled `label`.
///
/// Submission goes through the form rather than a pointer click, which the
/// console's sticky footer can intercept.
pub async fn hit_continue(browser: &Browser, label: &str) -> Result<(), AutomationError> {
    debug!(label, "Submitting form");
    browser
        .locator(Selector::Button(label.to_string()))
        .first()
        .await?
        .submit()
        .await
}

/// Pointer-click the button labelled `label`
pub async fn hit_button(browser: &Browser, label: &str) -> Result<(), AutomationError> {
    debug!(label, "Clicking button");
    browser
        .locator(Selector::Button(label.to_string()))
        .first()
        .await?
        .click()
        .await
}
