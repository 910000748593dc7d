//! AWS IAM backend
//!
//! Configuration via the standard AWS SDK chain (env vars, shared profiles,
//! instance profile, ...), optionally narrowed by [`ClientOptions`].
//! Connection-level and throttling retries are handled by the SDK's
//! standard retry mode; this layer never retries on its own.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::primitives::DateTime as AwsDateTime;
use aws_sdk_iam::Client;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt::Debug;
use tracing::{debug, info};

use iw_common::{Principal, PrincipalKind};

use crate::{AttachedPolicyRef, IamApi, IamError, IamResult, Page, PrincipalDetails};

/// Options narrowing the default AWS SDK configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
    /// Total attempts per call including the first
    pub max_attempts: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            endpoint_url: None,
            max_attempts: 3,
        }
    }
}

/// [`IamApi`] backed by the AWS SDK IAM client
pub struct AwsIamClient {
    client: Client,
}

impl AwsIamClient {
    /// Create a new client from the SDK default chain plus `options`
    pub async fn new(options: ClientOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(options.max_attempts.max(1)));

        if let Some(region) = options.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let config = loader.load().await;
        info!(
            region = ?options.region,
            profile = ?options.profile,
            endpoint_url = ?options.endpoint_url,
            max_attempts = options.max_attempts,
            "Initialized AWS IAM client"
        );

        Self::from_client(Client::new(&config))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Classify an SDK error by its service error code.
fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> IamError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match err.as_service_error() {
        Some(service) => IamError::from_code(
            service.code().unwrap_or("Unknown"),
            format!("{}: {}", operation, service.message().unwrap_or_default()),
        ),
        None => IamError::Transport(format!("{}: {}", operation, DisplayErrorContext(&err))),
    }
}

fn to_utc(value: &AwsDateTime) -> IamResult<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
        .ok_or_else(|| IamError::Malformed(format!("timestamp out of range: {}", value)))
}

fn page<T>(items: Vec<T>, is_truncated: bool, marker: Option<&str>) -> Page<T> {
    Page {
        items,
        next_marker: if is_truncated { marker.map(str::to_string) } else { None },
    }
}

fn non_empty(path: &str) -> Option<String> {
    (!path.is_empty()).then(|| path.to_string())
}

#[async_trait]
impl IamApi for AwsIamClient {
    async fn get_principal(&self, principal: &Principal) -> IamResult<PrincipalDetails> {
        match principal.kind() {
            PrincipalKind::User => {
                let output = self.client
                    .get_user()
                    .user_name(principal.name())
                    .send()
                    .await
                    .map_err(|e| sdk_error("GetUser", e))?;

                let user = output.user()
                    .ok_or_else(|| IamError::Malformed("GetUser returned no user".to_string()))?;

                Ok(PrincipalDetails {
                    name: user.user_name().to_string(),
                    id: user.user_id().to_string(),
                    arn: user.arn().to_string(),
                    path: non_empty(user.path()),
                    create_date: to_utc(user.create_date())?,
                    password_last_used: user.password_last_used().map(to_utc).transpose()?,
                })
            }
            PrincipalKind::Group => {
                let output = self.client
                    .get_group()
                    .group_name(principal.name())
                    .send()
                    .await
                    .map_err(|e| sdk_error("GetGroup", e))?;

                let group = output.group()
                    .ok_or_else(|| IamError::Malformed("GetGroup returned no group".to_string()))?;

                Ok(PrincipalDetails {
                    name: group.group_name().to_string(),
                    id: group.group_id().to_string(),
                    arn: group.arn().to_string(),
                    path: non_empty(group.path()),
                    create_date: to_utc(group.create_date())?,
                    password_last_used: None,
                })
            }
        }
    }

    async fn get_login_profile(&self, user_name: &str) -> IamResult<bool> {
        let result = self.client
            .get_login_profile()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| sdk_error("GetLoginProfile", e));

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_access_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        let output = self.client
            .list_access_keys()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| sdk_error("ListAccessKeys", e))?;

        let items = output.access_key_metadata()
            .iter()
            .filter_map(|key| key.access_key_id().map(str::to_string))
            .collect();

        Ok(page(items, output.is_truncated(), output.marker()))
    }

    async fn list_signing_certificates(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        let output = self.client
            .list_signing_certificates()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| sdk_error("ListSigningCertificates", e))?;

        let items = output.certificates()
            .iter()
            .map(|cert| cert.certificate_id().to_string())
            .collect();

        Ok(page(items, output.is_truncated(), output.marker()))
    }

    async fn list_ssh_public_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        let output = self.client
            .list_ssh_public_keys()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| sdk_error("ListSSHPublicKeys", e))?;

        let items = output.ssh_public_keys()
            .iter()
            .map(|key| key.ssh_public_key_id().to_string())
            .collect();

        Ok(page(items, output.is_truncated(), output.marker()))
    }

    async fn list_service_specific_credentials(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        let output = self.client
            .list_service_specific_credentials()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| sdk_error("ListServiceSpecificCredentials", e))?;

        let items = output.service_specific_credentials()
            .iter()
            .map(|cred| cred.service_specific_credential_id().to_string())
            .collect();

        Ok(page(items, output.is_truncated(), output.marker()))
    }

    async fn list_mfa_devices(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        let output = self.client
            .list_mfa_devices()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| sdk_error("ListMFADevices", e))?;

        let items = output.mfa_devices()
            .iter()
            .map(|device| device.serial_number().to_string())
            .collect();

        Ok(page(items, output.is_truncated(), output.marker()))
    }

    async fn list_inline_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>> {
        match principal.kind() {
            PrincipalKind::User => {
                let output = self.client
                    .list_user_policies()
                    .user_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListUserPolicies", e))?;

                Ok(page(output.policy_names().to_vec(), output.is_truncated(), output.marker()))
            }
            PrincipalKind::Group => {
                let output = self.client
                    .list_group_policies()
                    .group_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListGroupPolicies", e))?;

                Ok(page(output.policy_names().to_vec(), output.is_truncated(), output.marker()))
            }
        }
    }

    async fn list_attached_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<AttachedPolicyRef>> {
        let (policies, is_truncated, next) = match principal.kind() {
            PrincipalKind::User => {
                let output = self.client
                    .list_attached_user_policies()
                    .user_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListAttachedUserPolicies", e))?;

                (output.attached_policies().to_vec(), output.is_truncated(), output.marker().map(str::to_string))
            }
            PrincipalKind::Group => {
                let output = self.client
                    .list_attached_group_policies()
                    .group_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListAttachedGroupPolicies", e))?;

                (output.attached_policies().to_vec(), output.is_truncated(), output.marker().map(str::to_string))
            }
        };

        let items = policies
            .iter()
            .map(|policy| {
                let policy_arn = policy.policy_arn()
                    .ok_or_else(|| IamError::Malformed("attached policy without ARN".to_string()))?;
                Ok(AttachedPolicyRef {
                    policy_name: policy.policy_name().unwrap_or(policy_arn).to_string(),
                    policy_arn: policy_arn.to_string(),
                })
            })
            .collect::<IamResult<Vec<_>>>()?;

        Ok(page(items, is_truncated, next.as_deref()))
    }

    async fn list_memberships(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>> {
        match principal.kind() {
            PrincipalKind::User => {
                let output = self.client
                    .list_groups_for_user()
                    .user_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListGroupsForUser", e))?;

                let items = output.groups()
                    .iter()
                    .map(|group| group.group_name().to_string())
                    .collect();

                Ok(page(items, output.is_truncated(), output.marker()))
            }
            PrincipalKind::Group => {
                let output = self.client
                    .get_group()
                    .group_name(principal.name())
                    .set_marker(marker)
                    .send()
                    .await
                    .map_err(|e| sdk_error("GetGroup", e))?;

                let items = output.users()
                    .iter()
                    .map(|user| user.user_name().to_string())
                    .collect();

                Ok(page(items, output.is_truncated(), output.marker()))
            }
        }
    }

    async fn get_access_key_last_used(&self, access_key_id: &str) -> IamResult<Option<DateTime<Utc>>> {
        let output = self.client
            .get_access_key_last_used()
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| sdk_error("GetAccessKeyLastUsed", e))?;

        output.access_key_last_used()
            .and_then(|last_used| last_used.last_used_date())
            .map(to_utc)
            .transpose()
    }

    async fn delete_login_profile(&self, user_name: &str) -> IamResult<()> {
        self.client
            .delete_login_profile()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteLoginProfile", e))?;

        debug!(user_name, "Login profile deleted");
        Ok(())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> IamResult<()> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteAccessKey", e))?;

        debug!(user_name, access_key_id, "Access key deleted");
        Ok(())
    }

    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> IamResult<()> {
        self.client
            .delete_signing_certificate()
            .user_name(user_name)
            .certificate_id(certificate_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSigningCertificate", e))?;

        debug!(user_name, certificate_id, "Signing certificate deleted");
        Ok(())
    }

    async fn delete_ssh_public_key(&self, user_name: &str, ssh_public_key_id: &str) -> IamResult<()> {
        self.client
            .delete_ssh_public_key()
            .user_name(user_name)
            .ssh_public_key_id(ssh_public_key_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSSHPublicKey", e))?;

        debug!(user_name, ssh_public_key_id, "SSH public key deleted");
        Ok(())
    }

    async fn delete_service_specific_credential(&self, user_name: &str, credential_id: &str) -> IamResult<()> {
        self.client
            .delete_service_specific_credential()
            .user_name(user_name)
            .service_specific_credential_id(credential_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteServiceSpecificCredential", e))?;

        debug!(user_name, credential_id, "Service-specific credential deleted");
        Ok(())
    }

    async fn deactivate_mfa_device(&self, user_name: &str, serial_number: &str) -> IamResult<()> {
        self.client
            .deactivate_mfa_device()
            .user_name(user_name)
            .serial_number(serial_number)
            .send()
            .await
            .map_err(|e| sdk_error("DeactivateMFADevice", e))?;

        debug!(user_name, serial_number, "MFA device deactivated");
        Ok(())
    }

    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> IamResult<()> {
        self.client
            .delete_virtual_mfa_device()
            .serial_number(serial_number)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteVirtualMFADevice", e))?;

        debug!(serial_number, "Virtual MFA device deleted");
        Ok(())
    }

    async fn delete_inline_policy(&self, principal: &Principal, policy_name: &str) -> IamResult<()> {
        match principal.kind() {
            PrincipalKind::User => {
                self.client
                    .delete_user_policy()
                    .user_name(principal.name())
                    .policy_name(policy_name)
                    .send()
                    .await
                    .map_err(|e| sdk_error("DeleteUserPolicy", e))?;
            }
            PrincipalKind::Group => {
                self.client
                    .delete_group_policy()
                    .group_name(principal.name())
                    .policy_name(policy_name)
                    .send()
                    .await
                    .map_err(|e| sdk_error("DeleteGroupPolicy", e))?;
            }
        }

        debug!(principal = %principal, policy_name, "Inline policy deleted");
        Ok(())
    }

    async fn detach_policy(&self, principal: &Principal, policy_arn: &str) -> IamResult<()> {
        match principal.kind() {
            PrincipalKind::User => {
                self.client
                    .detach_user_policy()
                    .user_name(principal.name())
                    .policy_arn(policy_arn)
                    .send()
                    .await
                    .map_err(|e| sdk_error("DetachUserPolicy", e))?;
            }
            PrincipalKind::Group => {
                self.client
                    .detach_group_policy()
                    .group_name(principal.name())
                    .policy_arn(policy_arn)
                    .send()
                    .await
                    .map_err(|e| sdk_error("DetachGroupPolicy", e))?;
            }
        }

        debug!(principal = %principal, policy_arn, "Managed policy detached");
        Ok(())
    }

    async fn remove_membership(&self, principal: &Principal, member: &str) -> IamResult<()> {
        let (user_name, group_name) = match principal.kind() {
            PrincipalKind::User => (principal.name(), member),
            PrincipalKind::Group => (member, principal.name()),
        };

        self.client
            .remove_user_from_group()
            .user_name(user_name)
            .group_name(group_name)
            .send()
            .await
            .map_err(|e| sdk_error("RemoveUserFromGroup", e))?;

        debug!(user_name, group_name, "User removed from group");
        Ok(())
    }

    async fn delete_principal(&self, principal: &Principal) -> IamResult<()> {
        match principal.kind() {
            PrincipalKind::User => {
                self.client
                    .delete_user()
                    .user_name(principal.name())
                    .send()
                    .await
                    .map_err(|e| sdk_error("DeleteUser", e))?;
            }
            PrincipalKind::Group => {
                self.client
                    .delete_group()
                    .group_name(principal.name())
                    .send()
                    .await
                    .map_err(|e| sdk_error("DeleteGroup", e))?;
            }
        }

        info!(principal = %principal, "Principal deleted");
        Ok(())
    }
}
