//! IAM Warden collaborator API
//!
//! [`IamApi`] is the seam between the lifecycle/audit logic and the identity
//! control plane. Backends:
//! - AWS IAM via the AWS SDK (feature `aws`, on by default)
//! - In-memory [`mock::MockIamApi`] for tests (feature `testing`)
//!
//! List calls are page-level: callers drive pagination with the returned
//! marker, usually through [`collect_pages`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iw_common::Principal;
use std::future::Future;

pub mod error;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use error::IamError;

#[cfg(feature = "aws")]
pub use aws::{AwsIamClient, ClientOptions};

pub type IamResult<T> = std::result::Result<T, IamError>;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Marker for the next page; `None` once the listing is exhausted
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    /// A single, final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }
}

/// Base attributes of a user or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalDetails {
    pub name: String,
    /// Provider-generated stable id (`AIDA...` / `AGPA...`)
    pub id: String,
    pub arn: String,
    pub path: Option<String>,
    pub create_date: DateTime<Utc>,
    /// Users only; absent when the console password was never used
    pub password_last_used: Option<DateTime<Utc>>,
}

/// A managed policy attached to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedPolicyRef {
    pub policy_name: String,
    pub policy_arn: String,
}

/// Identity control-plane operations consumed by IAM Warden.
///
/// Methods taking a [`Principal`] apply to both users and groups; the
/// backend picks the user or group flavour of the underlying call. Methods
/// taking a `user_name` only exist for users.
#[async_trait]
pub trait IamApi: Send + Sync {
    // Reads

    async fn get_principal(&self, principal: &Principal) -> IamResult<PrincipalDetails>;

    /// Whether the user has a console password
    async fn get_login_profile(&self, user_name: &str) -> IamResult<bool>;

    async fn list_access_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>>;

    async fn list_signing_certificates(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>>;

    async fn list_ssh_public_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>>;

    async fn list_service_specific_credentials(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>>;

    /// Serial numbers of the user's MFA devices (ARNs for virtual devices)
    async fn list_mfa_devices(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>>;

    async fn list_inline_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>>;

    async fn list_attached_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<AttachedPolicyRef>>;

    /// Groups a user belongs to, or users a group contains
    async fn list_memberships(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>>;

    /// Last time the key was used; `None` if it never was
    async fn get_access_key_last_used(&self, access_key_id: &str) -> IamResult<Option<DateTime<Utc>>>;

    // Mutations

    async fn delete_login_profile(&self, user_name: &str) -> IamResult<()>;

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> IamResult<()>;

    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> IamResult<()>;

    async fn delete_ssh_public_key(&self, user_name: &str, ssh_public_key_id: &str) -> IamResult<()>;

    async fn delete_service_specific_credential(&self, user_name: &str, credential_id: &str) -> IamResult<()>;

    async fn deactivate_mfa_device(&self, user_name: &str, serial_number: &str) -> IamResult<()>;

    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> IamResult<()>;

    async fn delete_inline_policy(&self, principal: &Principal, policy_name: &str) -> IamResult<()>;

    async fn detach_policy(&self, principal: &Principal, policy_arn: &str) -> IamResult<()>;

    /// Remove the user from the group; `member` is the group for a user
    /// principal and the user for a group principal
    async fn remove_membership(&self, principal: &Principal, member: &str) -> IamResult<()>;

    async fn delete_principal(&self, principal: &Principal) -> IamResult<()>;
}

/// Drain a paginated listing, calling `fetch` with each successive marker.
///
/// Stops at the first error. A page whose next marker repeats the marker it
/// was requested with ends the listing and contributes no items.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> IamResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = IamResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = fetch(marker.clone()).await?;

        if page.next_marker.is_some() && page.next_marker == marker {
            return Ok(items);
        }

        items.extend(page.items);
        match page.next_marker {
            Some(next) => marker = Some(next),
            None => return Ok(items),
        }
    }
}
