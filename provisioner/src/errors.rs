use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A branch the flow recognises but deliberately does not drive.
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Extracted secret material failed its format check.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// The document went away under a lookup, usually mid-navigation.
    #[error("Page not ready: {0}")]
    PageNotReady(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Human interaction failed: {0}")]
    HumanInteraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<chromiumoxide::error::CdpError> for AutomationError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        AutomationError::PlatformError(format!("CDP error: {e}"))
    }
}
