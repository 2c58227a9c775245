//! Root credential generation and persistence
//!
//! Credentials are written to disk before the browser is touched, so a run
//! that dies halfway through still leaves the operator with what they need
//! to finish the signup by hand.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::AccountTemplates;
use crate::AutomationError;

/// Placeholder replaced by the random suffix in account templates
pub const SUFFIX_TOKEN: &str = "{suffix}";
pub const SUFFIX_LEN: usize = 6;

pub const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &[u8] = b"0123456789";
/// Symbols the console's password policy accepts
pub const SYMBOLS: &[u8] = b"!@#$%^&*()<>[]{}|_+-=";

const CHARACTER_CLASSES: [&[u8]; 4] = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS];
const RANDOM_PASSWORD_CHARS: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_name: String,
    pub email_address: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_name", &self.account_name)
            .field("email_address", &self.email_address)
            .field("password", &"***")
            .finish()
    }
}

/// Account name and email address derived from one random suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub account_name: String,
    pub email_address: String,
}

/// Six lowercase letters from the OS random source.
///
/// Nothing checks for collisions with earlier accounts; at 26^6 the odds
/// are accepted.
pub fn generate_suffix() -> String {
    (0..SUFFIX_LEN)
        .filter_map(|_| LOWERCASE.choose(&mut OsRng))
        .map(|&b| b as char)
        .collect()
}

pub fn generate_identifiers(templates: &AccountTemplates) -> Identifiers {
    let suffix = generate_suffix();
    Identifiers {
        account_name: templates.account_name.replace(SUFFIX_TOKEN, &suffix),
        email_address: templates.email_address.replace(SUFFIX_TOKEN, &suffix),
    }
}

/// Eight characters from the union of all classes plus one from each class,
/// shuffled so the guaranteed characters land in random positions.
pub fn generate_password() -> String {
    let alphabet: Vec<u8> = CHARACTER_CLASSES.concat();
    let mut chars: Vec<u8> = (0..RANDOM_PASSWORD_CHARS)
        .filter_map(|_| alphabet.choose(&mut OsRng).copied())
        .collect();
    chars.extend(
        CHARACTER_CLASSES
            .iter()
            .filter_map(|class| class.choose(&mut OsRng).copied()),
    );
    chars.shuffle(&mut OsRng);
    chars.into_iter().map(char::from).collect()
}

pub fn generate_credentials(templates: &AccountTemplates) -> Credentials {
    let Identifiers {
        account_name,
        email_address,
    } = generate_identifiers(templates);
    info!(%account_name, %email_address, "Generated root credentials");
    Credentials {
        account_name,
        email_address,
        password: generate_password(),
    }
}

impl Credentials {
    /// `credentials-<account_name>.txt`
    pub fn file_name(&self) -> String {
        format!("credentials-{}.txt", self.account_name)
    }

    /// The persisted form, newline included
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}\n",
            self.account_name, self.email_address, self.password
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, AutomationError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        // The password goes last, so it may contain anything
        let mut fields = line.splitn(3, ',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(account_name), Some(email_address), Some(password))
                if !account_name.is_empty() && !email_address.is_empty() && !password.is_empty() =>
            {
                Ok(Self {
                    account_name: account_name.to_string(),
                    email_address: email_address.to_string(),
                    password: password.to_string(),
                })
            }
            _ => Err(AutomationError::InvalidArgument(
                "expected a line of the form account_name,email_address,password".to_string(),
            )),
        }
    }

    /// Read credentials back from a file written by [`save_credentials`]
    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(path)?;
        let line = raw.lines().next().ok_or_else(|| {
            AutomationError::InvalidArgument(format!("{} is empty", path.display()))
        })?;
        Self::parse_line(line)
    }
}

/// Write the credential file into `dir` and return its path.
///
/// On Unix the file is created readable by the owner only.
pub fn save_credentials(credentials: &Credentials, dir: &Path) -> Result<PathBuf, AutomationError> {
    let path = dir.join(credentials.file_name());
    write_private(&path, credentials.to_line().as_bytes())?;
    info!("Saved credentials to {}", path.display());
    Ok(path)
}

/// Create or truncate `path` with owner-only permissions and write `contents`.
pub fn write_private(path: &Path, contents: &[u8]) -> Result<(), AutomationError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    debug!(bytes = contents.len(), "Wrote {}", path.display());
    Ok(())
}
