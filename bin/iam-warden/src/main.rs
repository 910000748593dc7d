//! iam-warden
//!
//! Decommission or audit a single AWS IAM user or group.
//!
//! Configuration precedence: command-line flags, then `IAM_WARDEN_*`
//! environment variables, then the config file, then defaults.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

use iam_warden::{run, Cli, ExitCode};
use iw_common::logging::{init_logging, LogOptions};
use iw_config::{AppConfig, ConfigLoader};
use iw_iam::{AwsIamClient, ClientOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match start(&cli).await {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::Unexpected.into()
        }
    }
}

async fn start(cli: &Cli) -> Result<ExitCode> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    init_logging(&log_options(&config)).context("Failed to initialise logging")?;
    if let Some(path) = &config.source {
        info!(?path, "Loaded configuration from file");
    }
    debug!(?config, "Configuration loaded");

    let client = AwsIamClient::new(ClientOptions {
        region: config.aws.region.clone(),
        profile: config.aws.profile.clone(),
        endpoint_url: config.aws.endpoint_url.clone(),
        max_attempts: config.aws.max_attempts,
    })
    .await;

    let mut stdout = io::stdout().lock();
    let code = run(&cli.command, &client, &config.output, &mut stdout).await;
    debug!(code = code.as_i32(), outcome = code.description(), "Finished");

    Ok(code)
}

fn log_options(config: &AppConfig) -> LogOptions {
    LogOptions {
        json: config.logging.is_json(),
        level: config.logging.level.clone(),
        warn_file: config.logging.warn_file.as_ref().map(PathBuf::from),
    }
}
