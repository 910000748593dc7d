//! Deletion Planner
//!
//! A pure function from an [`Inventory`] to an ordered [`DeletionPlan`].

use iw_common::{Principal, PrincipalKind};

use crate::category::{ResourceCategory, Verb};
use crate::enumerator::Inventory;

/// One mutating call in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionStep {
    /// `None` for the terminal principal delete
    pub category: Option<ResourceCategory>,
    pub identifier: String,
    pub verb: Verb,
}

impl DeletionStep {
    pub fn is_terminal(&self) -> bool {
        self.verb == Verb::DeletePrincipal
    }

    /// The equivalent AWS CLI invocation, e.g.
    /// `aws iam delete-access-key --user-name alice --access-key-id AKIA1`
    pub fn command_line(&self, principal: &Principal) -> String {
        let kind = principal.kind();
        let owner = format!("--{}-name {}", kind.as_str(), principal.name());
        let id = &self.identifier;

        let args = match self.verb {
            Verb::DeleteLoginProfile => owner,
            Verb::DeleteAccessKey => format!("{} --access-key-id {}", owner, id),
            Verb::DeleteSigningCertificate => format!("{} --certificate-id {}", owner, id),
            Verb::DeleteSshPublicKey => format!("{} --ssh-public-key-id {}", owner, id),
            Verb::DeleteServiceSpecificCredential => {
                format!("{} --service-specific-credential-id {}", owner, id)
            }
            Verb::DeactivateMfaDevice => format!("{} --serial-number {}", owner, id),
            Verb::DeleteVirtualMfaDevice => format!("--serial-number {}", id),
            Verb::DeleteInlinePolicy => format!("{} --policy-name {}", owner, id),
            Verb::DetachPolicy => format!("{} --policy-arn {}", owner, id),
            Verb::RemoveMembership => match kind {
                PrincipalKind::User => format!("--group-name {} --user-name {}", id, principal.name()),
                PrincipalKind::Group => format!("--group-name {} --user-name {}", principal.name(), id),
            },
            Verb::DeletePrincipal => owner,
        };

        format!("aws iam {} {}", self.verb.cli_name(kind), args)
    }
}

/// Ordered steps for one principal; the terminal delete is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    principal: Principal,
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn terminal(&self) -> Option<&DeletionStep> {
        self.steps.last().filter(|step| step.is_terminal())
    }

    /// One AWS CLI line per step, in plan order
    pub fn command_lines(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| step.command_line(&self.principal))
            .collect()
    }
}

/// Build the deletion plan for an inventory.
pub fn plan(inventory: &Inventory) -> DeletionPlan {
    let principal = inventory.principal().clone();
    let mut steps = Vec::with_capacity(inventory.total() + 1);

    for category in ResourceCategory::for_kind(principal.kind()) {
        let verbs = category.spec().verbs;

        for resource in inventory.resources(category) {
            steps.extend(
                verbs
                    .iter()
                    .filter(|verb| verb.applies_to(&resource.identifier))
                    .map(|&verb| DeletionStep {
                        category: Some(category),
                        identifier: resource.identifier.clone(),
                        verb,
                    }),
            );
        }
    }

    steps.push(DeletionStep {
        category: None,
        identifier: principal.name().to_string(),
        verb: Verb::DeletePrincipal,
    });

    DeletionPlan { principal, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::BoundResource;

    fn inventory(principal: Principal, resources: &[(ResourceCategory, &str)]) -> Inventory {
        let mut inventory = Inventory::empty(principal);
        for (category, identifier) in resources {
            inventory.push(BoundResource::new(*category, *identifier));
        }
        inventory
    }

    #[test]
    fn test_empty_inventory_plans_only_terminal() {
        let plan = plan(&inventory(Principal::user("ivan").unwrap(), &[]));

        assert_eq!(plan.len(), 1);
        let terminal = plan.terminal().unwrap();
        assert_eq!(terminal.category, None);
        assert_eq!(terminal.identifier, "ivan");
        assert_eq!(plan.command_lines(), vec!["aws iam delete-user --user-name ivan"]);
    }

    #[test]
    fn test_orders_by_category_not_insertion() {
        let plan = plan(&inventory(
            Principal::user("judy").unwrap(),
            &[
                (ResourceCategory::Memberships, "dev"),
                (ResourceCategory::AttachedPolicies, "arn:aws:iam::aws:policy/X"),
                (ResourceCategory::InlinePolicies, "Inline"),
                (ResourceCategory::AccessKeys, "AKIA1"),
            ],
        ));

        let categories: Vec<_> = plan.steps().iter().map(|s| s.category).collect();
        assert_eq!(
            categories,
            vec![
                Some(ResourceCategory::AccessKeys),
                Some(ResourceCategory::InlinePolicies),
                Some(ResourceCategory::AttachedPolicies),
                Some(ResourceCategory::Memberships),
                None,
            ]
        );
    }

    #[test]
    fn test_mfa_verbs_depend_on_device_type() {
        let virtual_serial = "arn:aws:iam::123456789012:mfa/kim";
        let plan = plan(&inventory(
            Principal::user("kim").unwrap(),
            &[
                (ResourceCategory::MfaDevices, virtual_serial),
                (ResourceCategory::MfaDevices, "GAHT12345678"),
            ],
        ));

        let verbs: Vec<_> = plan.steps().iter().map(|s| (s.verb, s.identifier.as_str())).collect();
        assert_eq!(
            verbs,
            vec![
                (Verb::DeactivateMfaDevice, virtual_serial),
                (Verb::DeleteVirtualMfaDevice, virtual_serial),
                (Verb::DeactivateMfaDevice, "GAHT12345678"),
                (Verb::DeletePrincipal, "kim"),
            ]
        );
    }

    #[test]
    fn test_command_lines() {
        let user = Principal::user("alice").unwrap();
        let group = Principal::group("dev").unwrap();
        let step = |category, identifier: &str, verb| DeletionStep {
            category: Some(category),
            identifier: identifier.to_string(),
            verb,
        };

        assert_eq!(
            step(ResourceCategory::AccessKeys, "AKIA1", Verb::DeleteAccessKey).command_line(&user),
            "aws iam delete-access-key --user-name alice --access-key-id AKIA1"
        );
        assert_eq!(
            step(ResourceCategory::InlinePolicies, "ReadOnly", Verb::DeleteInlinePolicy).command_line(&group),
            "aws iam delete-group-policy --group-name dev --policy-name ReadOnly"
        );
        assert_eq!(
            step(ResourceCategory::Memberships, "dev", Verb::RemoveMembership).command_line(&user),
            "aws iam remove-user-from-group --group-name dev --user-name alice"
        );
        assert_eq!(
            step(ResourceCategory::Memberships, "bob", Verb::RemoveMembership).command_line(&group),
            "aws iam remove-user-from-group --group-name dev --user-name bob"
        );
        assert_eq!(
            step(ResourceCategory::MfaDevices, "arn:mfa", Verb::DeleteVirtualMfaDevice).command_line(&user),
            "aws iam delete-virtual-mfa-device --serial-number arn:mfa"
        );
    }
}
