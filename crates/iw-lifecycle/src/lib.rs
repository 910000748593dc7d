//! IAM Warden decommissioning
//!
//! Removes a user or group together with everything bound to it:
//!
//! 1. [`enumerator`] lists each dependent resource category
//! 2. [`planner`] orders the deletions by dependency
//! 3. [`executor`] previews or applies the plan, step by step
//!
//! [`decommission`] ties the three together behind a principal lookup that
//! fails fast when the principal does not exist.

use thiserror::Error;
use tracing::{info, warn};

use iw_common::Principal;
use iw_iam::{IamApi, IamError};

pub mod category;
pub mod enumerator;
pub mod executor;
pub mod planner;

pub use category::{IdentifierKind, ResourceCategory, Verb};
pub use enumerator::{BoundResource, Inventory, LookupFailure, ResourceEnumerator};
pub use executor::{DecommissionExecutor, DecommissionReport, ExecutionState, Mode, StepOutcome, StepRecord};
pub use planner::{plan, DeletionPlan, DeletionStep};

#[derive(Error, Debug)]
pub enum DecommissionError {
    #[error("{0} does not exist")]
    PrincipalNotFound(Principal),

    #[error("Failed to look up {principal}: {source}")]
    Lookup {
        principal: Principal,
        #[source]
        source: IamError,
    },
}

/// Decommission one principal.
///
/// The principal is looked up before anything is enumerated; a missing
/// principal is [`DecommissionError::PrincipalNotFound`]. Once the lookup
/// succeeds the invocation always yields a report, whatever individual
/// steps do.
pub async fn decommission(
    api: &dyn IamApi,
    principal: &Principal,
    mode: Mode,
) -> Result<DecommissionReport, DecommissionError> {
    match api.get_principal(principal).await {
        Ok(details) => info!(principal = %principal, arn = %details.arn, %mode, "Decommissioning"),
        Err(IamError::NotFound(_)) => return Err(DecommissionError::PrincipalNotFound(principal.clone())),
        Err(source) => {
            return Err(DecommissionError::Lookup {
                principal: principal.clone(),
                source,
            })
        }
    }

    let inventory = ResourceEnumerator::new(api).enumerate(principal).await;
    let plan = planner::plan(&inventory);

    let mut report = DecommissionExecutor::new(api, mode).run(&plan).await;
    report.lookup_failures = inventory.lookup_failures().to_vec();

    if report.is_completed() {
        info!(
            principal = %principal,
            steps = report.records.len(),
            skipped = report.skipped_count(),
            duration_ms = report.duration_ms,
            "Decommission completed"
        );
    } else {
        warn!(
            principal = %principal,
            failed_steps = report.step_failures().count(),
            terminal_failed = report.terminal_failure().is_some(),
            "Decommission completed with failures"
        );
    }

    Ok(report)
}
