//! The operator at the terminal
//!
//! The flow stops here for anything it cannot do itself: verification codes
//! sent to the operator's email and phone, and CAPTCHA answers. Every call
//! waits for as long as the operator takes.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::captcha::ChallengeImage;
use crate::AutomationError;

#[async_trait::async_trait]
pub trait HumanInterface: Send + Sync {
    /// Show an image to the operator
    async fn display(&self, image: &ChallengeImage) -> Result<(), AutomationError>;

    /// Ask a question and wait for the answer, without a timeout
    async fn ask(&self, prompt: &str) -> Result<String, AutomationError>;
}

/// Prompts on stdout, answers from stdin, images in the desktop viewer
#[derive(Default)]
pub struct TerminalHuman {
    // Kept until drop so the viewer can still read them
    shown: Mutex<Vec<TempPath>>,
}

impl TerminalHuman {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HumanInterface for TerminalHuman {
    async fn display(&self, image: &ChallengeImage) -> Result<(), AutomationError> {
        let mut file = tempfile::Builder::new()
            .prefix("captcha-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile()?;
        file.write_all(&image.bytes)?;
        let path = file.into_temp_path();
        debug!("Showing challenge image {}", path.display());

        let target = path.to_path_buf();
        let opened = tokio::task::spawn_blocking(move || open::that(&target))
            .await
            .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))?;
        if let Err(e) = opened {
            // The operator can still open the file by hand
            warn!("Could not open an image viewer: {}", e);
            println!("Challenge image saved to {}", path.display());
        }

        if let Ok(mut shown) = self.shown.lock() {
            shown.push(path);
        }
        Ok(())
    }

    async fn ask(&self, prompt: &str) -> Result<String, AutomationError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;

            let mut answer = String::new();
            let read = std::io::stdin().lock().read_line(&mut answer)?;
            if read == 0 {
                return Err(AutomationError::HumanInteraction(
                    "standard input closed before an answer was given".to_string(),
                ));
            }
            Ok(answer.trim().to_string())
        })
        .await
        .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))?
    }
}
