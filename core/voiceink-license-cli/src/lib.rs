//! Command-line front end for the VoiceInk license gate.
//!
//! Drives a [`LicenseManager`] over the on-disk settings store, with the
//! Polar validator for key checks.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voiceink_license::{
    DeviceIdProvider, HardwareDeviceId, JsonFileStore, LicenseConfig, LicenseManager,
    LicenseState, PolarConfig, PolarValidator, DEFAULT_PURCHASE_URL, TRIAL_PERIOD_DAYS,
};

#[derive(Parser, Debug)]
#[command(name = "voiceink-license")]
#[command(about = "Inspect and manage the VoiceInk trial and license")]
pub struct Cli {
    /// Path to the license settings file
    #[arg(long, env = "VOICEINK_LICENSE_STORE")]
    pub store: Option<PathBuf>,

    /// Polar organization id
    #[arg(long, env = "VOICEINK_POLAR_ORG_ID", default_value = "")]
    pub org_id: String,

    /// Polar API token
    #[arg(long, env = "VOICEINK_POLAR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Polar API base URL
    #[arg(long, env = "VOICEINK_POLAR_BASE_URL", default_value = "https://api.polar.sh")]
    pub base_url: String,

    /// Length of the free trial in days
    #[arg(long, default_value_t = TRIAL_PERIOD_DAYS)]
    pub trial_days: u32,

    /// Purchase page opened by `buy`
    #[arg(long, default_value = DEFAULT_PURCHASE_URL)]
    pub purchase_url: String,

    /// Report the app as usable regardless of license state
    #[arg(long)]
    pub bypass_gate: bool,

    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the current license state
    Status,
    /// Record an app launch (starts the trial on the first one)
    Launch,
    /// Start the trial if it has not been started
    StartTrial,
    /// Validate and store a license key
    Activate {
        /// The license key
        key: String,
    },
    /// Re-check a stored device activation
    Revalidate,
    /// Remove the license and reset the trial
    Remove,
    /// Open the purchase page
    Buy,
    /// Print the identifier this device activates under
    DeviceId,
}

impl Cli {
    /// License manager configuration from the command line.
    #[must_use]
    pub fn license_config(&self) -> LicenseConfig {
        LicenseConfig {
            trial_period_days: self.trial_days,
            purchase_url: self.purchase_url.clone(),
            bypass_gate: self.bypass_gate,
        }
    }

    /// Polar configuration from the command line and environment.
    #[must_use]
    pub fn polar_config(&self) -> PolarConfig {
        PolarConfig {
            base_url: self.base_url.clone(),
            organization_id: self.org_id.clone(),
            api_token: self.token.clone(),
            ..Default::default()
        }
    }
}

/// Log filter for the binary. A valid `RUST_LOG` value wins; otherwise
/// warnings only, or debug output with `--verbose`.
#[must_use]
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "warn" }))
}

/// Opens the store, resolves the device identifier and builds the manager.
///
/// Returns the manager together with the device identifier.
pub fn build_manager(cli: &Cli) -> Result<(LicenseManager, String)> {
    let mut store = match &cli.store {
        Some(path) => JsonFileStore::open(path),
        None => JsonFileStore::open_default(),
    }
    .context("failed to open license store")?;
    info!(path = %store.path().display(), "Using license store");

    let device_id = HardwareDeviceId
        .device_id(&mut store)
        .context("failed to resolve device identifier")?;
    let validator = PolarValidator::new(cli.polar_config(), device_id.clone())
        .context("failed to create license validator")?;

    let manager = LicenseManager::new(cli.license_config(), Box::new(store), Box::new(validator));
    Ok((manager, device_id))
}

/// Machine-readable view of the license state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: LicenseState,
    pub can_use_app: bool,
    pub trial_days_remaining: Option<u32>,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub license_key: Option<String>,
    pub activations_limit: Option<u32>,
    pub message: Option<String>,
}

impl StatusReport {
    /// Captures the manager's current state. The key is masked.
    #[must_use]
    pub fn from_manager(manager: &LicenseManager) -> Self {
        let state = manager.state();
        Self {
            state,
            can_use_app: manager.can_use_app(),
            trial_days_remaining: state.trial_days_remaining(),
            trial_started_at: manager.trial_start_date(),
            license_key: manager.license_key().map(|k| mask_key(&k)),
            activations_limit: manager.activations_limit(),
            message: manager.validation_message(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            LicenseState::Trial { days_remaining } => {
                writeln!(f, "State:       trial ({days_remaining} days remaining)")?;
            }
            LicenseState::TrialExpired => writeln!(f, "State:       trial expired")?,
            LicenseState::Licensed => writeln!(f, "State:       licensed")?,
        }
        writeln!(f, "Can use app: {}", if self.can_use_app { "yes" } else { "no" })?;
        if let Some(started) = self.trial_started_at {
            writeln!(f, "Trial start: {}", started.format("%Y-%m-%d %H:%M UTC"))?;
        }
        if let Some(key) = &self.license_key {
            writeln!(f, "License key: {key}")?;
        }
        if let Some(limit) = self.activations_limit {
            writeln!(f, "Activations: limited to {limit} devices")?;
        }
        if let Some(message) = &self.message {
            writeln!(f, "Message:     {message}")?;
        }
        Ok(())
    }
}

/// Hides all but the last four characters of a key.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}

/// Output of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Status(StatusReport),
    DeviceId(String),
}

/// Runs `command` against `manager`.
///
/// # Errors
///
/// Fails when a key is rejected or a stored activation is revoked; the error
/// carries the manager's message.
pub async fn run(
    command: &Command,
    manager: &mut LicenseManager,
    device_id: &str,
) -> Result<CommandOutput> {
    match command {
        Command::Status => {}
        Command::Launch => {
            if manager.record_launch() {
                info!("First launch recorded");
            }
        }
        Command::StartTrial => {
            if !manager.start_trial() {
                info!("Trial was already started");
            }
        }
        Command::Activate { key } => {
            if !manager.validate_license(key).await {
                bail!(failure_message(manager));
            }
        }
        Command::Revalidate => {
            if !manager.revalidate_stored_license().await {
                bail!(failure_message(manager));
            }
        }
        Command::Remove => manager.remove_license(),
        Command::Buy => manager.open_purchase_link(),
        Command::DeviceId => return Ok(CommandOutput::DeviceId(device_id.to_string())),
    }
    Ok(CommandOutput::Status(StatusReport::from_manager(manager)))
}

fn failure_message(manager: &LicenseManager) -> String {
    manager
        .validation_message()
        .unwrap_or_else(|| "no license stored".to_string())
}
