//! Process exit codes for the iam-warden CLI.

use iw_lifecycle::DecommissionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitCode {
    /// Decommission completed, preview finished or audit finished
    Success = 0,
    /// Configuration, client construction or output failure
    Unexpected = 1,
    /// Missing or blank principal name, nothing to audit
    InputError = 2,
    /// Some non-terminal steps failed; the principal delete succeeded
    StepFailures = 3,
    /// The principal delete itself failed
    TerminalFailure = 4,
    PrincipalNotFound = 5,
    /// An audit lookup other than key last-use failed
    AuditFailed = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Unexpected => "Unexpected error",
            ExitCode::InputError => "Invalid input",
            ExitCode::StepFailures => "Completed with step failures",
            ExitCode::TerminalFailure => "Principal delete failed",
            ExitCode::PrincipalNotFound => "Principal not found",
            ExitCode::AuditFailed => "Audit failed",
        }
    }

    pub fn from_report(report: &DecommissionReport) -> Self {
        if report.terminal_failure().is_some() {
            ExitCode::TerminalFailure
        } else if report.step_failures().next().is_some() {
            ExitCode::StepFailures
        } else {
            ExitCode::Success
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
