//! VoiceInk license tool
//!
//! Usage:
//!   voiceink-license status
//!   voiceink-license activate <KEY>
//!
//! Polar credentials come from `VOICEINK_POLAR_ORG_ID` and
//! `VOICEINK_POLAR_TOKEN`. `RUST_LOG` overrides the log filter.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::FmtSubscriber;
use voiceink_license_cli::{build_manager, log_filter, run, Cli, CommandOutput};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let (mut manager, device_id) = build_manager(&cli)?;
    debug!(command = ?cli.command, "Running command");

    match run(&cli.command, &mut manager, &device_id).await? {
        CommandOutput::DeviceId(id) => println!("{id}"),
        CommandOutput::Status(report) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CommandOutput::Status(report) => print!("{report}"),
    }
    Ok(())
}
