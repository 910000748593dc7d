//! iam-warden command handlers
//!
//! Handlers take the [`IamApi`] and an output sink so the binary can hand
//! them the AWS client and stdout while tests pass a mock and a buffer.

use std::io::Write;
use tracing::{error, warn};

use iw_audit::AuditAggregator;
use iw_common::{Principal, PrincipalKind};
use iw_config::OutputConfig;
use iw_iam::IamApi;
use iw_lifecycle::{decommission, DecommissionError, Mode};

pub mod cli;
pub mod exit_codes;

pub use cli::{Cli, Command};
pub use exit_codes::ExitCode;

pub async fn run(command: &Command, api: &dyn IamApi, output: &OutputConfig, out: &mut dyn Write) -> ExitCode {
    match command {
        Command::Decommission {
            user_name,
            group_name,
            dry_run,
        } => {
            let (name, kind) = match (user_name, group_name) {
                (Some(name), _) => (name, PrincipalKind::User),
                (None, Some(name)) => (name, PrincipalKind::Group),
                (None, None) => {
                    error!("Either a user name or a group name is required");
                    return ExitCode::InputError;
                }
            };
            run_decommission(api, name, kind, Mode::from_dry_run(*dry_run), out).await
        }
        Command::Audit {
            user_name,
            group_name,
            compact,
        } => {
            let pretty = output.pretty && !compact;
            run_audit(api, user_name, group_name, pretty, out).await
        }
    }
}

pub async fn run_decommission(
    api: &dyn IamApi,
    name: &str,
    kind: PrincipalKind,
    mode: Mode,
    out: &mut dyn Write,
) -> ExitCode {
    let principal = match Principal::new(name, kind) {
        Ok(principal) => principal,
        Err(e) => {
            error!(error = %e, "Invalid principal");
            return ExitCode::InputError;
        }
    };

    let report = match decommission(api, &principal, mode).await {
        Ok(report) => report,
        Err(e @ DecommissionError::PrincipalNotFound(_)) => {
            error!(error = %e, "Nothing to decommission");
            return ExitCode::PrincipalNotFound;
        }
        Err(e) => {
            error!(error = %e, "Decommission aborted before any change");
            return ExitCode::Unexpected;
        }
    };

    if mode == Mode::Preview {
        for line in report.command_lines() {
            if let Err(e) = writeln!(out, "{}", line) {
                error!(error = %e, "Failed to write preview");
                return ExitCode::Unexpected;
            }
        }
    }

    ExitCode::from_report(&report)
}

/// Audit users first, then groups, each in argument order.
///
/// A failed principal does not stop the others. The exit code reflects the
/// worst failure: a lookup error outranks a missing principal.
pub async fn run_audit(
    api: &dyn IamApi,
    user_names: &[String],
    group_names: &[String],
    pretty: bool,
    out: &mut dyn Write,
) -> ExitCode {
    let principals: Result<Vec<Principal>, _> = user_names
        .iter()
        .map(Principal::user)
        .chain(group_names.iter().map(Principal::group))
        .collect();

    let principals = match principals {
        Ok(principals) if principals.is_empty() => {
            error!("Nothing to audit: pass --user-name and/or --group-name");
            return ExitCode::InputError;
        }
        Ok(principals) => principals,
        Err(e) => {
            error!(error = %e, "Invalid principal");
            return ExitCode::InputError;
        }
    };

    let aggregator = AuditAggregator::new(api);
    let mut status = ExitCode::Success;

    for principal in &principals {
        let snapshot = match aggregator.audit(principal).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let code = if e.is_not_found() {
                    ExitCode::PrincipalNotFound
                } else {
                    ExitCode::AuditFailed
                };
                warn!(principal = %principal, error = %e, "Audit failed");
                status = status.max(code);
                continue;
            }
        };

        let rendered = snapshot.to_map().and_then(|map| {
            if pretty {
                serde_json::to_string_pretty(&map)
            } else {
                serde_json::to_string(&map)
            }
        });
        let written = match rendered {
            Ok(json) => writeln!(out, "{}", json),
            Err(e) => {
                error!(principal = %principal, error = %e, "Failed to render snapshot");
                return ExitCode::Unexpected;
            }
        };
        if let Err(e) = written {
            error!(error = %e, "Failed to write snapshot");
            return ExitCode::Unexpected;
        }
    }

    status
}
