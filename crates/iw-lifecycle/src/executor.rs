//! Decommission Executor
//!
//! Walks a [`DeletionPlan`] one step at a time. Preview mode records what
//! would be done without calling the API; execute mode applies each step,
//! keeps going after a failed step, and always attempts the terminal delete.

use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use iw_common::Principal;
use iw_iam::{IamApi, IamError, IamResult};

use crate::category::{ResourceCategory, Verb};
use crate::enumerator::LookupFailure;
use crate::planner::{DeletionPlan, DeletionStep};

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report planned steps; never mutate
    Preview,
    Execute,
}

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Mode::Preview
        } else {
            Mode::Execute
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Preview => write!(f, "preview"),
            Mode::Execute => write!(f, "execute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Previewed,
    Succeeded,
    /// The resource was already gone
    Skipped(String),
    Failed(IamError),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// The outcome of one step, carrying the step it applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: DeletionStep,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn category(&self) -> Option<ResourceCategory> {
        self.step.category
    }

    pub fn identifier(&self) -> &str {
        &self.step.identifier
    }

    pub fn verb(&self) -> Verb {
        self.step.verb
    }
}

/// `Planned -> Running -> {Completed | CompletedWithFailures}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Planned,
    Running,
    Completed,
    CompletedWithFailures,
}

impl ExecutionState {
    fn finish(self, any_failed: bool) -> Self {
        match self {
            ExecutionState::Running if any_failed => ExecutionState::CompletedWithFailures,
            ExecutionState::Running => ExecutionState::Completed,
            other => other,
        }
    }
}

/// Result of one decommission invocation.
#[derive(Debug, Clone)]
pub struct DecommissionReport {
    pub principal: Principal,
    pub mode: Mode,
    pub state: ExecutionState,
    pub records: Vec<StepRecord>,
    pub lookup_failures: Vec<LookupFailure>,
    pub duration_ms: u64,
}

impl DecommissionReport {
    pub fn is_completed(&self) -> bool {
        self.state == ExecutionState::Completed
    }

    /// Failed non-terminal steps
    pub fn step_failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.records
            .iter()
            .filter(|record| record.outcome.is_failure() && !record.step.is_terminal())
    }

    /// The terminal delete's error, if it failed
    pub fn terminal_failure(&self) -> Option<&IamError> {
        self.records
            .iter()
            .filter(|record| record.step.is_terminal())
            .find_map(|record| match &record.outcome {
                StepOutcome::Failed(error) => Some(error),
                _ => None,
            })
    }

    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record.outcome, StepOutcome::Skipped(_)))
            .count()
    }

    /// AWS CLI lines for every recorded step, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.step.command_line(&self.principal))
            .collect()
    }
}

pub struct DecommissionExecutor<'a> {
    api: &'a dyn IamApi,
    mode: Mode,
}

impl<'a> DecommissionExecutor<'a> {
    pub fn new(api: &'a dyn IamApi, mode: Mode) -> Self {
        Self { api, mode }
    }

    pub async fn run(&self, plan: &DeletionPlan) -> DecommissionReport {
        let start = Instant::now();
        let principal = plan.principal();
        let mut state = ExecutionState::Planned;
        let mut records = Vec::with_capacity(plan.len());

        debug!(principal = %principal, steps = plan.len(), mode = %self.mode, "Executing plan");
        state = transition(state, ExecutionState::Running);

        for step in plan.steps() {
            let outcome = match self.mode {
                Mode::Preview => StepOutcome::Previewed,
                Mode::Execute => self.apply(principal, step).await,
            };
            self.log_outcome(principal, step, &outcome);
            records.push(StepRecord {
                step: step.clone(),
                outcome,
            });
        }

        let any_failed = records.iter().any(|record| record.outcome.is_failure());
        state = transition(state, state.finish(any_failed));

        DecommissionReport {
            principal: principal.clone(),
            mode: self.mode,
            state,
            records,
            lookup_failures: Vec::new(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn apply(&self, principal: &Principal, step: &DeletionStep) -> StepOutcome {
        match self.dispatch(principal, step).await {
            Ok(()) => StepOutcome::Succeeded,
            // A principal that vanished before its delete is a terminal failure
            Err(IamError::NotFound(message)) if !step.is_terminal() => StepOutcome::Skipped(message),
            Err(e) => StepOutcome::Failed(e),
        }
    }

    async fn dispatch(&self, principal: &Principal, step: &DeletionStep) -> IamResult<()> {
        let api = self.api;
        let name = principal.name();
        let id = step.identifier.as_str();

        match step.verb {
            Verb::DeleteLoginProfile => api.delete_login_profile(name).await,
            Verb::DeleteAccessKey => api.delete_access_key(name, id).await,
            Verb::DeleteSigningCertificate => api.delete_signing_certificate(name, id).await,
            Verb::DeleteSshPublicKey => api.delete_ssh_public_key(name, id).await,
            Verb::DeleteServiceSpecificCredential => api.delete_service_specific_credential(name, id).await,
            Verb::DeactivateMfaDevice => api.deactivate_mfa_device(name, id).await,
            Verb::DeleteVirtualMfaDevice => api.delete_virtual_mfa_device(id).await,
            Verb::DeleteInlinePolicy => api.delete_inline_policy(principal, id).await,
            Verb::DetachPolicy => api.detach_policy(principal, id).await,
            Verb::RemoveMembership => api.remove_membership(principal, id).await,
            Verb::DeletePrincipal => api.delete_principal(principal).await,
        }
    }

    fn log_outcome(&self, principal: &Principal, step: &DeletionStep, outcome: &StepOutcome) {
        let category = step.category.map(|c| c.as_str()).unwrap_or("principal");
        let verb = verb_label(principal, step);

        match outcome {
            StepOutcome::Previewed => {}
            StepOutcome::Succeeded => info!(
                principal = %principal.name(),
                category,
                identifier = %step.identifier,
                verb,
                "Step succeeded"
            ),
            StepOutcome::Skipped(reason) => info!(
                principal = %principal.name(),
                category,
                identifier = %step.identifier,
                verb,
                reason = %reason,
                "Step skipped, resource already absent"
            ),
            StepOutcome::Failed(e) if step.is_terminal() => error!(
                principal = %principal.name(),
                category,
                identifier = %step.identifier,
                verb,
                error = %e,
                "Principal delete failed"
            ),
            StepOutcome::Failed(e) => warn!(
                principal = %principal.name(),
                category,
                identifier = %step.identifier,
                verb,
                error = %e,
                "Step failed, continuing"
            ),
        }
    }
}

/// CLI verb as applied to this principal's kind, e.g. `delete-group-policy`
fn verb_label(principal: &Principal, step: &DeletionStep) -> &'static str {
    step.verb.cli_name(principal.kind())
}

fn transition(from: ExecutionState, to: ExecutionState) -> ExecutionState {
    debug!(?from, ?to, "Execution state change");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::{BoundResource, Inventory};
    use crate::planner::plan;
    use iw_iam::mock::MockIamApi;

    fn plan_for(principal: &Principal, resources: &[(ResourceCategory, &str)]) -> DeletionPlan {
        let mut inventory = Inventory::empty(principal.clone());
        for (category, identifier) in resources {
            inventory.push(BoundResource::new(*category, *identifier));
        }
        plan(&inventory)
    }

    #[tokio::test]
    async fn test_preview_never_calls_api() {
        let api = MockIamApi::new().with_user("lee", |u| u.access_keys = vec!["AKIA1".into()]);
        let lee = Principal::user("lee").unwrap();
        let plan = plan_for(&lee, &[(ResourceCategory::AccessKeys, "AKIA1")]);

        let report = DecommissionExecutor::new(&api, Mode::Preview).run(&plan).await;

        assert!(api.calls().is_empty());
        assert_eq!(report.state, ExecutionState::Completed);
        assert!(report.records.iter().all(|r| r.outcome == StepOutcome::Previewed));
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_skipped_not_failed() {
        let api = MockIamApi::new().with_user("mia", |_| {});
        let mia = Principal::user("mia").unwrap();
        let plan = plan_for(&mia, &[(ResourceCategory::AccessKeys, "AKIAGONE")]);

        let report = DecommissionExecutor::new(&api, Mode::Execute).run(&plan).await;

        assert!(matches!(report.records[0].outcome, StepOutcome::Skipped(_)));
        assert_eq!(report.records[1].outcome, StepOutcome::Succeeded);
        assert_eq!(report.state, ExecutionState::Completed);
        assert_eq!(report.skipped_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_failure_reported_distinctly() {
        let api = MockIamApi::new()
            .with_user("ned", |_| {})
            .failing("delete_principal", IamError::AccessDenied("DeleteUser".into()));
        let ned = Principal::user("ned").unwrap();

        let report = DecommissionExecutor::new(&api, Mode::Execute)
            .run(&plan_for(&ned, &[]))
            .await;

        assert_eq!(report.state, ExecutionState::CompletedWithFailures);
        assert_eq!(report.step_failures().count(), 0);
        assert_eq!(
            report.terminal_failure(),
            Some(&IamError::AccessDenied("DeleteUser".into()))
        );
    }

    #[tokio::test]
    async fn test_vanished_principal_is_terminal_failure() {
        let api = MockIamApi::new();
        let ghost = Principal::user("ghost").unwrap();

        let report = DecommissionExecutor::new(&api, Mode::Execute)
            .run(&plan_for(&ghost, &[]))
            .await;

        assert!(report.records[0].outcome.is_failure());
        assert_eq!(report.state, ExecutionState::CompletedWithFailures);
        assert!(report.terminal_failure().is_some_and(IamError::is_not_found));
    }

    #[test]
    fn test_group_steps_log_group_verbs() {
        let dev = Principal::group("dev").unwrap();
        let plan = plan_for(&dev, &[(ResourceCategory::InlinePolicies, "DevInline")]);

        let labels: Vec<_> = plan.steps().iter().map(|step| verb_label(&dev, step)).collect();
        assert_eq!(labels, vec!["delete-group-policy", "delete-group"]);
    }

    #[test]
    fn test_state_finish() {
        assert_eq!(ExecutionState::Running.finish(false), ExecutionState::Completed);
        assert_eq!(ExecutionState::Running.finish(true), ExecutionState::CompletedWithFailures);
        assert_eq!(ExecutionState::Planned.finish(true), ExecutionState::Planned);
    }
}
