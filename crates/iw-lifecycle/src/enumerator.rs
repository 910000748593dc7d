//! Resource Enumerator
//!
//! One listing pass per category, each drained to completion. A failed
//! listing is recorded and the category treated as empty; enumeration never
//! aborts on a single category.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use iw_common::Principal;
use iw_iam::{collect_pages, IamApi, IamError, IamResult};

use crate::category::{IdentifierKind, ResourceCategory};

/// A dependent resource discovered on a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundResource {
    pub category: ResourceCategory,
    pub identifier: String,
    pub identifier_kind: IdentifierKind,
}

impl BoundResource {
    pub fn new(category: ResourceCategory, identifier: impl Into<String>) -> Self {
        Self {
            category,
            identifier: identifier.into(),
            identifier_kind: category.spec().identifier_kind,
        }
    }
}

/// A category whose listing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub category: ResourceCategory,
    pub operation: &'static str,
    pub error: IamError,
}

/// Everything bound to one principal, per category.
#[derive(Debug, Clone)]
pub struct Inventory {
    principal: Principal,
    resources: BTreeMap<ResourceCategory, Vec<BoundResource>>,
    lookup_failures: Vec<LookupFailure>,
}

impl Inventory {
    /// An inventory with every applicable category empty
    pub fn empty(principal: Principal) -> Self {
        let resources = ResourceCategory::for_kind(principal.kind())
            .map(|category| (category, Vec::new()))
            .collect();

        Self {
            principal,
            resources,
            lookup_failures: Vec::new(),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Resources of one category in enumeration order
    pub fn resources(&self, category: ResourceCategory) -> &[BoundResource] {
        self.resources.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories present on the inventory, in deletion order
    pub fn categories(&self) -> impl Iterator<Item = ResourceCategory> + '_ {
        self.resources.keys().copied()
    }

    pub fn lookup_failures(&self) -> &[LookupFailure] {
        &self.lookup_failures
    }

    pub fn total(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    pub fn push(&mut self, resource: BoundResource) {
        self.resources.entry(resource.category).or_default().push(resource);
    }

    pub fn record_failure(&mut self, failure: LookupFailure) {
        self.lookup_failures.push(failure);
    }
}

pub struct ResourceEnumerator<'a> {
    api: &'a dyn IamApi,
}

impl<'a> ResourceEnumerator<'a> {
    pub fn new(api: &'a dyn IamApi) -> Self {
        Self { api }
    }

    pub async fn enumerate(&self, principal: &Principal) -> Inventory {
        let mut inventory = Inventory::empty(principal.clone());

        for category in ResourceCategory::for_kind(principal.kind()) {
            let operation = category.list_operation(principal.kind());

            let identifiers = match self.list(principal, category).await {
                Ok(identifiers) => identifiers,
                Err(error) => {
                    warn!(
                        principal = %principal.name(),
                        category = %category,
                        operation,
                        error = %error,
                        "Resource listing failed"
                    );
                    // A failed login-profile lookup keeps the step: deleting
                    // an absent profile is skipped by the executor.
                    let assume_present = category == ResourceCategory::LoginProfile;
                    inventory.record_failure(LookupFailure { category, operation, error });
                    if assume_present {
                        vec![principal.name().to_string()]
                    } else {
                        Vec::new()
                    }
                }
            };

            debug!(
                principal = %principal.name(),
                category = %category,
                count = identifiers.len(),
                "Enumerated category"
            );

            for identifier in identifiers {
                inventory.push(BoundResource::new(category, identifier));
            }
        }

        inventory
    }

    async fn list(&self, principal: &Principal, category: ResourceCategory) -> IamResult<Vec<String>> {
        let api = self.api;
        let name = principal.name();

        match category {
            ResourceCategory::LoginProfile => {
                let present = api.get_login_profile(name).await?;
                Ok(if present { vec![name.to_string()] } else { Vec::new() })
            }
            ResourceCategory::AccessKeys => {
                collect_pages(|marker| async move { api.list_access_keys(name, marker).await }).await
            }
            ResourceCategory::SigningCertificates => {
                collect_pages(|marker| async move { api.list_signing_certificates(name, marker).await }).await
            }
            ResourceCategory::SshPublicKeys => {
                collect_pages(|marker| async move { api.list_ssh_public_keys(name, marker).await }).await
            }
            ResourceCategory::ServiceSpecificCredentials => {
                collect_pages(|marker| async move { api.list_service_specific_credentials(name, marker).await }).await
            }
            ResourceCategory::MfaDevices => {
                collect_pages(|marker| async move { api.list_mfa_devices(name, marker).await }).await
            }
            ResourceCategory::InlinePolicies => {
                collect_pages(|marker| async move { api.list_inline_policies(principal, marker).await }).await
            }
            ResourceCategory::AttachedPolicies => {
                let policies =
                    collect_pages(|marker| async move { api.list_attached_policies(principal, marker).await }).await?;
                Ok(policies.into_iter().map(|policy| policy.policy_arn).collect())
            }
            ResourceCategory::Memberships => {
                collect_pages(|marker| async move { api.list_memberships(principal, marker).await }).await
            }
        }
    }
}
