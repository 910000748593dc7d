use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use iw_config::AppConfig;

/// Decommission and audit AWS IAM users and groups
#[derive(Parser, Debug)]
#[command(name = "iam-warden", version)]
pub struct Cli {
    /// Configuration file (default: search iam-warden.toml, ./config, /etc/iam-warden)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// AWS region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Named AWS profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// IAM endpoint override
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Remove a user or group and everything bound to it
    #[command(group(
        ArgGroup::new("principal")
            .required(true)
            .args(["user_name", "group_name"])
    ))]
    Decommission {
        #[arg(long)]
        user_name: Option<String>,

        #[arg(long)]
        group_name: Option<String>,

        /// Print the AWS CLI commands that would run, change nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a JSON snapshot of each named user and group
    Audit {
        #[arg(long)]
        user_name: Vec<String>,

        #[arg(long)]
        group_name: Vec<String>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
}

impl Cli {
    /// Command-line flags take precedence over file and environment
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(region) = &self.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(profile) = &self.profile {
            config.aws.profile = Some(profile.clone());
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            config.aws.endpoint_url = Some(endpoint_url.clone());
        }
    }
}
