//! IAM Warden audit
//!
//! Aggregates a user's or group's attributes and relationships into one
//! [`AuditSnapshot`] without modifying anything.

use thiserror::Error;

use iw_common::Principal;
use iw_iam::IamError;

pub mod aggregator;
pub mod snapshot;

pub use aggregator::AuditAggregator;
pub use snapshot::{AttachedPolicy, AuditSnapshot, GroupSnapshot, UserSnapshot};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("{operation} failed for {principal}: {source}")]
    Read {
        operation: &'static str,
        principal: Principal,
        #[source]
        source: IamError,
    },
}

impl AuditError {
    /// Whether the principal itself does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            AuditError::Read { operation, source, .. } => {
                source.is_not_found() && matches!(*operation, "GetUser" | "GetGroup")
            }
        }
    }
}
