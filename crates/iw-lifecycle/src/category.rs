//! Resource categories and the verbs that remove them
//!
//! [`ResourceCategory::ORDER`] is the deletion-dependency order: credentials
//! first, then permissions, then relationships. The principal delete is not a
//! category; it is the terminal [`Verb::DeletePrincipal`] step.

use iw_common::PrincipalKind;
use std::fmt;

/// A kind of dependent resource bound to a principal.
///
/// Variant order is deletion order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceCategory {
    LoginProfile,
    AccessKeys,
    SigningCertificates,
    SshPublicKeys,
    ServiceSpecificCredentials,
    MfaDevices,
    InlinePolicies,
    AttachedPolicies,
    Memberships,
}

/// How a resource's identifier should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Name,
    Arn,
    GeneratedId,
    SerialNumber,
}

/// A single mutating control-plane call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    DeleteLoginProfile,
    DeleteAccessKey,
    DeleteSigningCertificate,
    DeleteSshPublicKey,
    DeleteServiceSpecificCredential,
    DeactivateMfaDevice,
    DeleteVirtualMfaDevice,
    DeleteInlinePolicy,
    DetachPolicy,
    RemoveMembership,
    DeletePrincipal,
}

/// Static description of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    /// Verbs applied to each resource, in order
    pub verbs: &'static [Verb],
    pub identifier_kind: IdentifierKind,
}

impl ResourceCategory {
    pub const ORDER: [ResourceCategory; 9] = [
        ResourceCategory::LoginProfile,
        ResourceCategory::AccessKeys,
        ResourceCategory::SigningCertificates,
        ResourceCategory::SshPublicKeys,
        ResourceCategory::ServiceSpecificCredentials,
        ResourceCategory::MfaDevices,
        ResourceCategory::InlinePolicies,
        ResourceCategory::AttachedPolicies,
        ResourceCategory::Memberships,
    ];

    /// Categories that exist for a principal kind, in deletion order
    pub fn for_kind(kind: PrincipalKind) -> impl Iterator<Item = ResourceCategory> {
        Self::ORDER.into_iter().filter(move |category| category.applies_to(kind))
    }

    pub fn applies_to(self, kind: PrincipalKind) -> bool {
        match kind {
            PrincipalKind::User => true,
            PrincipalKind::Group => matches!(
                self,
                ResourceCategory::InlinePolicies
                    | ResourceCategory::AttachedPolicies
                    | ResourceCategory::Memberships
            ),
        }
    }

    pub fn spec(self) -> CategorySpec {
        use IdentifierKind::*;
        use Verb::*;

        let (verbs, identifier_kind): (&'static [Verb], IdentifierKind) = match self {
            ResourceCategory::LoginProfile => (&[DeleteLoginProfile], Name),
            ResourceCategory::AccessKeys => (&[DeleteAccessKey], GeneratedId),
            ResourceCategory::SigningCertificates => (&[DeleteSigningCertificate], GeneratedId),
            ResourceCategory::SshPublicKeys => (&[DeleteSshPublicKey], GeneratedId),
            ResourceCategory::ServiceSpecificCredentials => (&[DeleteServiceSpecificCredential], GeneratedId),
            ResourceCategory::MfaDevices => (&[DeactivateMfaDevice, DeleteVirtualMfaDevice], SerialNumber),
            ResourceCategory::InlinePolicies => (&[DeleteInlinePolicy], Name),
            ResourceCategory::AttachedPolicies => (&[DetachPolicy], Arn),
            ResourceCategory::Memberships => (&[RemoveMembership], Name),
        };

        CategorySpec { verbs, identifier_kind }
    }

    /// The provider listing operation for this category
    pub fn list_operation(self, kind: PrincipalKind) -> &'static str {
        match (self, kind) {
            (ResourceCategory::LoginProfile, _) => "GetLoginProfile",
            (ResourceCategory::AccessKeys, _) => "ListAccessKeys",
            (ResourceCategory::SigningCertificates, _) => "ListSigningCertificates",
            (ResourceCategory::SshPublicKeys, _) => "ListSSHPublicKeys",
            (ResourceCategory::ServiceSpecificCredentials, _) => "ListServiceSpecificCredentials",
            (ResourceCategory::MfaDevices, _) => "ListMFADevices",
            (ResourceCategory::InlinePolicies, PrincipalKind::User) => "ListUserPolicies",
            (ResourceCategory::InlinePolicies, PrincipalKind::Group) => "ListGroupPolicies",
            (ResourceCategory::AttachedPolicies, PrincipalKind::User) => "ListAttachedUserPolicies",
            (ResourceCategory::AttachedPolicies, PrincipalKind::Group) => "ListAttachedGroupPolicies",
            (ResourceCategory::Memberships, PrincipalKind::User) => "ListGroupsForUser",
            (ResourceCategory::Memberships, PrincipalKind::Group) => "GetGroup",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::LoginProfile => "login_profile",
            ResourceCategory::AccessKeys => "access_keys",
            ResourceCategory::SigningCertificates => "signing_certificates",
            ResourceCategory::SshPublicKeys => "ssh_public_keys",
            ResourceCategory::ServiceSpecificCredentials => "service_specific_credentials",
            ResourceCategory::MfaDevices => "mfa_devices",
            ResourceCategory::InlinePolicies => "inline_policies",
            ResourceCategory::AttachedPolicies => "attached_policies",
            ResourceCategory::Memberships => "memberships",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Verb {
    /// AWS CLI subcommand name for the verb applied to a principal kind
    pub fn cli_name(self, kind: PrincipalKind) -> &'static str {
        match (self, kind) {
            (Verb::DeleteLoginProfile, _) => "delete-login-profile",
            (Verb::DeleteAccessKey, _) => "delete-access-key",
            (Verb::DeleteSigningCertificate, _) => "delete-signing-certificate",
            (Verb::DeleteSshPublicKey, _) => "delete-ssh-public-key",
            (Verb::DeleteServiceSpecificCredential, _) => "delete-service-specific-credential",
            (Verb::DeactivateMfaDevice, _) => "deactivate-mfa-device",
            (Verb::DeleteVirtualMfaDevice, _) => "delete-virtual-mfa-device",
            (Verb::DeleteInlinePolicy, PrincipalKind::User) => "delete-user-policy",
            (Verb::DeleteInlinePolicy, PrincipalKind::Group) => "delete-group-policy",
            (Verb::DetachPolicy, PrincipalKind::User) => "detach-user-policy",
            (Verb::DetachPolicy, PrincipalKind::Group) => "detach-group-policy",
            (Verb::RemoveMembership, _) => "remove-user-from-group",
            (Verb::DeletePrincipal, PrincipalKind::User) => "delete-user",
            (Verb::DeletePrincipal, PrincipalKind::Group) => "delete-group",
        }
    }

    /// Whether the verb applies to a resource with this identifier.
    ///
    /// Only virtual MFA devices (ARN serials) can be deleted; hardware
    /// devices are deactivated and left alone.
    pub fn applies_to(self, identifier: &str) -> bool {
        match self {
            Verb::DeleteVirtualMfaDevice => is_virtual_mfa_serial(identifier),
            _ => true,
        }
    }
}

pub fn is_virtual_mfa_serial(serial_number: &str) -> bool {
    serial_number.starts_with("arn:")
}
