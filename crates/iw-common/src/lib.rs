//! IAM Warden shared types
//!
//! The [`Principal`] model shared by the decommission and audit paths, plus
//! process-wide structured logging setup.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod logging;

/// Errors raised while constructing a [`Principal`] from operator input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("{0} name must not be empty")]
    EmptyName(PrincipalKind),
}

/// The kind of identity a principal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    /// Lower-case noun used in AWS CLI flags (`--user-name`, `--group-name`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject of one invocation: a named user or group.
///
/// Immutable once constructed. The name is trimmed and must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    kind: PrincipalKind,
}

impl Principal {
    pub fn new(name: impl Into<String>, kind: PrincipalKind) -> Result<Self, PrincipalError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(PrincipalError::EmptyName(kind));
        }
        Ok(Self { name, kind })
    }

    pub fn user(name: impl Into<String>) -> Result<Self, PrincipalError> {
        Self::new(name, PrincipalKind::User)
    }

    pub fn group(name: impl Into<String>) -> Result<Self, PrincipalError> {
        Self::new(name, PrincipalKind::Group)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn is_user(&self) -> bool {
        self.kind == PrincipalKind::User
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}
