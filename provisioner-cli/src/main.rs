//! Root Provisioner CLI
//!
//! Provisions an AWS root account through the sign-up console, pausing for
//! the operator at every verification code and CAPTCHA.
//!
//! Usage:
//!   provisioner signup                         # Sign up a new root account
//!   provisioner signup --create-key            # ... and mint an access key
//!   provisioner create-key --credentials-file credentials-isme-root-abcdef.txt
//!   provisioner generate                       # Only generate and save credentials

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use provisioner::credentials::write_private;
use provisioner::root_console::AccessKey;
use provisioner::{
    create_root_access_key, generate_credentials, provision_root_account, save_credentials,
    AccountTemplates, ChromiumLauncher, CreateAccessKeyResponse, Credentials, ProvisionOptions,
    ProvisionerConfig, SessionSettings, TerminalHuman,
};
use tracing::{error, info};

mod utils;

#[derive(Parser)]
#[command(name = "provisioner")]
#[command(about = "Provision an AWS root account through the sign-up console")]
struct Cli {
    /// Configuration file [default: ~/.aws/root_user_config.yaml]
    #[clap(long, global = true, env = "PROVISIONER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for credential files and failure screenshots
    #[clap(long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Run the browser without a window
    #[clap(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate credentials and run the sign-up flow
    Signup(SignupArgs),
    /// Sign in as an existing root user and mint an access key
    CreateKey(CreateKeyArgs),
    /// Generate and save credentials without opening a browser
    Generate,
}

#[derive(Args, Debug)]
struct SignupArgs {
    /// Mint an access key once the account is signed up
    #[clap(long)]
    create_key: bool,

    /// Also write the key as `AccessKeyId,SecretAccessKey` to this file
    #[clap(long, requires = "create_key")]
    key_file: Option<PathBuf>,

    /// Keep the browser open until Enter is pressed
    #[clap(long)]
    pause_before_exit: bool,
}

#[derive(Args, Debug)]
struct CreateKeyArgs {
    /// Credential file written by an earlier `signup` or `generate`
    #[clap(long, conflicts_with_all = ["email", "password"])]
    credentials_file: Option<PathBuf>,

    /// Root user email address
    #[clap(long, requires = "password")]
    email: Option<String>,

    /// Root user password
    #[clap(long, requires = "email")]
    password: Option<String>,

    /// Also write the key as `AccessKeyId,SecretAccessKey` to this file
    #[clap(long)]
    key_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = utils::init_logging() {
        eprintln!("Failed to initialise logging: {e:?}");
    }

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.is_some();
    let config_path = match cli.config {
        Some(path) => path,
        None => ProvisionerConfig::default_path()
            .context("Cannot locate the home directory; pass --config")?,
    };
    let context = || format!("Failed to load configuration from {}", config_path.display());

    match cli.command {
        Commands::Signup(args) => {
            let mut config = ProvisionerConfig::load(&config_path).with_context(context)?;
            if cli.headless {
                config.browser.headless = true;
            }
            signup(&config, &cli.output_dir, args).await
        }
        Commands::CreateKey(args) => {
            // Signing in needs no account details, and no file at all
            let mut settings = if explicit || config_path.exists() {
                SessionSettings::load(&config_path).with_context(context)?
            } else {
                SessionSettings::default()
            };
            if cli.headless {
                settings.browser.headless = true;
            }
            create_key(&settings, &cli.output_dir, args).await
        }
        Commands::Generate => {
            let templates = AccountTemplates::load(&config_path).with_context(context)?;
            generate(&templates, &cli.output_dir)
        }
    }
}

async fn signup(config: &ProvisionerConfig, output_dir: &Path, args: SignupArgs) -> Result<()> {
    let launcher = ChromiumLauncher::new(config.browser.clone());
    let human = TerminalHuman::new();
    let options = ProvisionOptions {
        output_dir: output_dir.to_path_buf(),
        create_key: args.create_key,
        pause_before_exit: args.pause_before_exit,
    };

    let outcome = provision_root_account(config, &launcher, &human, &options)
        .await
        .context("Root account provisioning failed")?;
    info!(
        "Root account {} is signed up; credentials are in {}",
        outcome.credentials.account_name,
        outcome.credentials_path.display()
    );

    if let Some(key) = outcome.access_key {
        emit_key(key, args.key_file.as_deref())?;
    }
    Ok(())
}

async fn create_key(settings: &SessionSettings, output_dir: &Path, args: CreateKeyArgs) -> Result<()> {
    let credentials = match (args.credentials_file, args.email, args.password) {
        (Some(path), _, _) => Credentials::load(&path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?,
        (None, Some(email), Some(password)) => Credentials {
            account_name: email.split('@').next().unwrap_or_default().to_string(),
            email_address: email,
            password,
        },
        _ => bail!("Pass --credentials-file, or both --email and --password"),
    };

    let launcher = ChromiumLauncher::new(settings.browser.clone());
    let key = create_root_access_key(&credentials, &settings.timeouts, &launcher, output_dir)
        .await
        .context("Access key creation failed")?;
    emit_key(key, args.key_file.as_deref())
}

fn generate(templates: &AccountTemplates, output_dir: &Path) -> Result<()> {
    let credentials = generate_credentials(templates);
    let path = save_credentials(&credentials, output_dir)?;
    println!("{}", path.display());
    Ok(())
}

/// Print the key in `aws iam create-access-key` form, optionally keeping a
/// private copy on disk
fn emit_key(key: AccessKey, key_file: Option<&Path>) -> Result<()> {
    if let Some(path) = key_file {
        write_private(path, key.to_line().as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved access key to {}", path.display());
    }
    let response = CreateAccessKeyResponse::from(key);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
