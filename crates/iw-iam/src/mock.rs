//! In-memory [`IamApi`] for tests
//!
//! Behaves like the real control plane where it matters to callers:
//! mutations remove state, deleting something absent answers `NotFound`,
//! deleting a principal with dependent resources answers `DeleteConflict`,
//! and listings paginate when a page size is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use iw_common::{Principal, PrincipalKind};

use crate::{AttachedPolicyRef, IamApi, IamError, IamResult, Page, PrincipalDetails};

const ACCOUNT_ID: &str = "123456789012";

/// Resources held by one mock user or group
#[derive(Debug, Clone)]
pub struct MockPrincipal {
    pub id: String,
    pub arn: String,
    pub path: Option<String>,
    pub create_date: DateTime<Utc>,
    pub password_last_used: Option<DateTime<Utc>>,
    pub login_profile: bool,
    pub access_keys: Vec<String>,
    pub signing_certificates: Vec<String>,
    pub ssh_public_keys: Vec<String>,
    pub service_specific_credentials: Vec<String>,
    pub mfa_devices: Vec<String>,
    pub inline_policies: Vec<String>,
    pub attached_policies: Vec<AttachedPolicyRef>,
    /// Groups for a user, member users for a group
    pub memberships: Vec<String>,
}

impl MockPrincipal {
    fn new(name: &str, kind: PrincipalKind) -> Self {
        let (id_prefix, arn_kind) = match kind {
            PrincipalKind::User => ("AIDA", "user"),
            PrincipalKind::Group => ("AGPA", "group"),
        };

        Self {
            id: format!("{}{}", id_prefix, name.to_ascii_uppercase()),
            arn: format!("arn:aws:iam::{}:{}/{}", ACCOUNT_ID, arn_kind, name),
            path: Some("/".to_string()),
            // 2020-01-01T00:00:00Z
            create_date: DateTime::from_timestamp(1_577_836_800, 0).unwrap_or_default(),
            password_last_used: None,
            login_profile: false,
            access_keys: Vec::new(),
            signing_certificates: Vec::new(),
            ssh_public_keys: Vec::new(),
            service_specific_credentials: Vec::new(),
            mfa_devices: Vec::new(),
            inline_policies: Vec::new(),
            attached_policies: Vec::new(),
            memberships: Vec::new(),
        }
    }

    /// Attach a managed policy by ARN; the name is the ARN's last segment
    pub fn attach(&mut self, policy_arn: &str) {
        let policy_name = policy_arn.rsplit('/').next().unwrap_or(policy_arn);
        self.attached_policies.push(AttachedPolicyRef {
            policy_name: policy_name.to_string(),
            policy_arn: policy_arn.to_string(),
        });
    }

    fn has_dependents(&self) -> bool {
        self.login_profile
            || !self.access_keys.is_empty()
            || !self.signing_certificates.is_empty()
            || !self.ssh_public_keys.is_empty()
            || !self.service_specific_credentials.is_empty()
            || !self.mfa_devices.is_empty()
            || !self.inline_policies.is_empty()
            || !self.attached_policies.is_empty()
            || !self.memberships.is_empty()
    }
}

/// One recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: &'static str,
    pub principal: String,
    pub identifier: Option<String>,
}

impl MockCall {
    pub fn is_mutation(&self) -> bool {
        ["delete_", "deactivate_", "detach_", "remove_"]
            .iter()
            .any(|prefix| self.operation.starts_with(prefix))
    }
}

#[derive(Default)]
struct MockState {
    principals: HashMap<(PrincipalKind, String), MockPrincipal>,
    /// Deactivated virtual MFA devices awaiting deletion
    virtual_mfa_devices: HashSet<String>,
    key_last_used: HashMap<String, DateTime<Utc>>,
    /// Keyed by "operation" or "operation:identifier"
    failures: HashMap<String, IamError>,
    calls: Vec<MockCall>,
}

/// In-memory IAM control plane
pub struct MockIamApi {
    state: Mutex<MockState>,
    page_size: Option<usize>,
}

impl MockIamApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            page_size: None,
        }
    }

    /// Split every listing into pages of `size` items
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    pub fn with_user(self, name: &str, configure: impl FnOnce(&mut MockPrincipal)) -> Self {
        self.with_principal(name, PrincipalKind::User, configure)
    }

    pub fn with_group(self, name: &str, configure: impl FnOnce(&mut MockPrincipal)) -> Self {
        self.with_principal(name, PrincipalKind::Group, configure)
    }

    fn with_principal(self, name: &str, kind: PrincipalKind, configure: impl FnOnce(&mut MockPrincipal)) -> Self {
        let mut principal = MockPrincipal::new(name, kind);
        configure(&mut principal);
        self.state.lock().principals.insert((kind, name.to_string()), principal);
        self
    }

    pub fn with_key_last_used(self, access_key_id: &str, last_used: DateTime<Utc>) -> Self {
        self.state.lock().key_last_used.insert(access_key_id.to_string(), last_used);
        self
    }

    /// Fail every call to `operation`
    pub fn failing(self, operation: &str, error: IamError) -> Self {
        self.state.lock().failures.insert(operation.to_string(), error);
        self
    }

    /// Fail calls to `operation` that target `identifier`
    pub fn failing_on(self, operation: &str, identifier: &str, error: IamError) -> Self {
        self.state
            .lock()
            .failures
            .insert(format!("{}:{}", operation, identifier), error);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls().into_iter().filter(MockCall::is_mutation).collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn exists(&self, principal: &Principal) -> bool {
        self.state.lock().principals.contains_key(&key(principal))
    }

    /// Snapshot of a principal's remaining resources
    pub fn principal(&self, principal: &Principal) -> Option<MockPrincipal> {
        self.state.lock().principals.get(&key(principal)).cloned()
    }

    /// Record the call, then apply any injected failure
    fn begin(&self, operation: &'static str, principal: &str, identifier: Option<&str>) -> IamResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall {
            operation,
            principal: principal.to_string(),
            identifier: identifier.map(str::to_string),
        });

        if let Some(id) = identifier {
            if let Some(error) = state.failures.get(&format!("{}:{}", operation, id)) {
                return Err(error.clone());
            }
        }
        match state.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn page<T: Clone>(&self, items: &[T], marker: Option<String>) -> IamResult<Page<T>> {
        let start = match marker {
            Some(marker) => marker
                .strip_prefix("offset:")
                .and_then(|offset| offset.parse::<usize>().ok())
                .ok_or_else(|| IamError::Service {
                    code: "InvalidInput".to_string(),
                    message: format!("bad marker {}", marker),
                })?,
            None => 0,
        };

        let size = self.page_size.unwrap_or(usize::MAX);
        let end = start.saturating_add(size).min(items.len());
        let start = start.min(end);

        Ok(Page {
            items: items[start..end].to_vec(),
            next_marker: (end < items.len()).then(|| format!("offset:{}", end)),
        })
    }

    fn read<T>(&self, principal: &Principal, f: impl FnOnce(&MockPrincipal) -> T) -> IamResult<T> {
        let state = self.state.lock();
        state
            .principals
            .get(&key(principal))
            .map(f)
            .ok_or_else(|| not_found(principal))
    }

    fn read_user<T>(&self, user_name: &str, f: impl FnOnce(&MockPrincipal) -> T) -> IamResult<T> {
        self.read(&user(user_name)?, f)
    }

    /// Remove `identifier` from one of a principal's resource lists
    fn remove(
        &self,
        principal: &Principal,
        identifier: &str,
        list: impl FnOnce(&mut MockPrincipal) -> &mut Vec<String>,
    ) -> IamResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .principals
            .get_mut(&key(principal))
            .ok_or_else(|| not_found(principal))?;

        let items = list(entry);
        let position = items
            .iter()
            .position(|item| item == identifier)
            .ok_or_else(|| IamError::NotFound(format!("{} of {}", identifier, principal)))?;
        items.remove(position);
        Ok(())
    }
}

impl Default for MockIamApi {
    fn default() -> Self {
        Self::new()
    }
}

fn key(principal: &Principal) -> (PrincipalKind, String) {
    (principal.kind(), principal.name().to_string())
}

fn user(name: &str) -> IamResult<Principal> {
    Principal::user(name).map_err(|e| IamError::Service {
        code: "ValidationError".to_string(),
        message: e.to_string(),
    })
}

fn not_found(principal: &Principal) -> IamError {
    IamError::NotFound(format!("The {} cannot be found", principal))
}

#[async_trait]
impl IamApi for MockIamApi {
    async fn get_principal(&self, principal: &Principal) -> IamResult<PrincipalDetails> {
        self.begin("get_principal", principal.name(), None)?;
        self.read(principal, |p| PrincipalDetails {
            name: principal.name().to_string(),
            id: p.id.clone(),
            arn: p.arn.clone(),
            path: p.path.clone(),
            create_date: p.create_date,
            password_last_used: p.password_last_used,
        })
    }

    async fn get_login_profile(&self, user_name: &str) -> IamResult<bool> {
        self.begin("get_login_profile", user_name, None)?;
        self.read_user(user_name, |p| p.login_profile)
    }

    async fn list_access_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_access_keys", user_name, None)?;
        let items = self.read_user(user_name, |p| p.access_keys.clone())?;
        self.page(&items, marker)
    }

    async fn list_signing_certificates(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_signing_certificates", user_name, None)?;
        let items = self.read_user(user_name, |p| p.signing_certificates.clone())?;
        self.page(&items, marker)
    }

    async fn list_ssh_public_keys(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_ssh_public_keys", user_name, None)?;
        let items = self.read_user(user_name, |p| p.ssh_public_keys.clone())?;
        self.page(&items, marker)
    }

    async fn list_service_specific_credentials(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_service_specific_credentials", user_name, None)?;
        let items = self.read_user(user_name, |p| p.service_specific_credentials.clone())?;
        self.page(&items, marker)
    }

    async fn list_mfa_devices(&self, user_name: &str, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_mfa_devices", user_name, None)?;
        let items = self.read_user(user_name, |p| p.mfa_devices.clone())?;
        self.page(&items, marker)
    }

    async fn list_inline_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_inline_policies", principal.name(), None)?;
        let items = self.read(principal, |p| p.inline_policies.clone())?;
        self.page(&items, marker)
    }

    async fn list_attached_policies(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<AttachedPolicyRef>> {
        self.begin("list_attached_policies", principal.name(), None)?;
        let items = self.read(principal, |p| p.attached_policies.clone())?;
        self.page(&items, marker)
    }

    async fn list_memberships(&self, principal: &Principal, marker: Option<String>) -> IamResult<Page<String>> {
        self.begin("list_memberships", principal.name(), None)?;
        let items = self.read(principal, |p| p.memberships.clone())?;
        self.page(&items, marker)
    }

    async fn get_access_key_last_used(&self, access_key_id: &str) -> IamResult<Option<DateTime<Utc>>> {
        self.begin("get_access_key_last_used", "", Some(access_key_id))?;
        let state = self.state.lock();
        let known = state
            .principals
            .values()
            .any(|p| p.access_keys.iter().any(|k| k == access_key_id));
        if !known {
            return Err(IamError::NotFound(format!("access key {}", access_key_id)));
        }
        Ok(state.key_last_used.get(access_key_id).copied())
    }

    async fn delete_login_profile(&self, user_name: &str) -> IamResult<()> {
        self.begin("delete_login_profile", user_name, Some(user_name))?;
        let principal = user(user_name)?;
        let mut state = self.state.lock();
        let entry = state
            .principals
            .get_mut(&key(&principal))
            .ok_or_else(|| not_found(&principal))?;
        if !entry.login_profile {
            return Err(IamError::NotFound(format!("Login Profile for {} cannot be found", user_name)));
        }
        entry.login_profile = false;
        Ok(())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> IamResult<()> {
        self.begin("delete_access_key", user_name, Some(access_key_id))?;
        self.remove(&user(user_name)?, access_key_id, |p| &mut p.access_keys)
    }

    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> IamResult<()> {
        self.begin("delete_signing_certificate", user_name, Some(certificate_id))?;
        self.remove(&user(user_name)?, certificate_id, |p| &mut p.signing_certificates)
    }

    async fn delete_ssh_public_key(&self, user_name: &str, ssh_public_key_id: &str) -> IamResult<()> {
        self.begin("delete_ssh_public_key", user_name, Some(ssh_public_key_id))?;
        self.remove(&user(user_name)?, ssh_public_key_id, |p| &mut p.ssh_public_keys)
    }

    async fn delete_service_specific_credential(&self, user_name: &str, credential_id: &str) -> IamResult<()> {
        self.begin("delete_service_specific_credential", user_name, Some(credential_id))?;
        self.remove(&user(user_name)?, credential_id, |p| &mut p.service_specific_credentials)
    }

    async fn deactivate_mfa_device(&self, user_name: &str, serial_number: &str) -> IamResult<()> {
        self.begin("deactivate_mfa_device", user_name, Some(serial_number))?;
        self.remove(&user(user_name)?, serial_number, |p| &mut p.mfa_devices)?;
        if serial_number.starts_with("arn:") {
            self.state.lock().virtual_mfa_devices.insert(serial_number.to_string());
        }
        Ok(())
    }

    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> IamResult<()> {
        self.begin("delete_virtual_mfa_device", "", Some(serial_number))?;
        let mut state = self.state.lock();
        if state.virtual_mfa_devices.remove(serial_number) {
            return Ok(());
        }
        let still_assigned = state
            .principals
            .values()
            .any(|p| p.mfa_devices.iter().any(|d| d == serial_number));
        if still_assigned {
            Err(IamError::Service {
                code: "DeleteConflict".to_string(),
                message: format!("MFA device {} is still in use", serial_number),
            })
        } else {
            Err(IamError::NotFound(format!("MFA device {}", serial_number)))
        }
    }

    async fn delete_inline_policy(&self, principal: &Principal, policy_name: &str) -> IamResult<()> {
        self.begin("delete_inline_policy", principal.name(), Some(policy_name))?;
        self.remove(principal, policy_name, |p| &mut p.inline_policies)
    }

    async fn detach_policy(&self, principal: &Principal, policy_arn: &str) -> IamResult<()> {
        self.begin("detach_policy", principal.name(), Some(policy_arn))?;
        let mut state = self.state.lock();
        let entry = state
            .principals
            .get_mut(&key(principal))
            .ok_or_else(|| not_found(principal))?;
        let position = entry
            .attached_policies
            .iter()
            .position(|policy| policy.policy_arn == policy_arn)
            .ok_or_else(|| IamError::NotFound(format!("Policy {} is not attached", policy_arn)))?;
        entry.attached_policies.remove(position);
        Ok(())
    }

    async fn remove_membership(&self, principal: &Principal, member: &str) -> IamResult<()> {
        self.begin("remove_membership", principal.name(), Some(member))?;
        self.remove(principal, member, |p| &mut p.memberships)?;

        // Keep the other side of the relationship consistent when it is modelled
        let counterpart = match principal.kind() {
            PrincipalKind::User => (PrincipalKind::Group, member.to_string()),
            PrincipalKind::Group => (PrincipalKind::User, member.to_string()),
        };
        if let Some(other) = self.state.lock().principals.get_mut(&counterpart) {
            other.memberships.retain(|m| m != principal.name());
        }
        Ok(())
    }

    async fn delete_principal(&self, principal: &Principal) -> IamResult<()> {
        self.begin("delete_principal", principal.name(), Some(principal.name()))?;
        let mut state = self.state.lock();
        let entry = state
            .principals
            .get(&key(principal))
            .ok_or_else(|| not_found(principal))?;
        if entry.has_dependents() {
            return Err(IamError::Service {
                code: "DeleteConflict".to_string(),
                message: format!("Cannot delete entity, {} still has dependent resources", principal),
            });
        }
        state.principals.remove(&key(principal));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect_pages;

    #[tokio::test]
    async fn test_pagination_markers() {
        let api = MockIamApi::new()
            .with_page_size(2)
            .with_user("alice", |u| {
                u.access_keys = vec!["K1".into(), "K2".into(), "K3".into()];
            });

        let first = api.list_access_keys("alice", None).await.unwrap();
        assert_eq!(first.items, vec!["K1", "K2"]);
        assert_eq!(first.next_marker.as_deref(), Some("offset:2"));

        let second = api.list_access_keys("alice", first.next_marker).await.unwrap();
        assert_eq!(second.items, vec!["K3"]);
        assert!(second.next_marker.is_none());
    }

    #[tokio::test]
    async fn test_collect_pages_against_mock() {
        let api = MockIamApi::new()
            .with_page_size(1)
            .with_group("dev", |g| g.memberships = vec!["a".into(), "b".into(), "c".into()]);
        let group = Principal::group("dev").unwrap();

        let members = collect_pages(|marker| {
            let api = &api;
            let group = &group;
            async move { api.list_memberships(group, marker).await }
        })
        .await
        .unwrap();

        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(api.call_count("list_memberships"), 3);
    }

    #[tokio::test]
    async fn test_delete_conflict_until_empty() {
        let api = MockIamApi::new().with_user("bob", |u| u.attach("arn:aws:iam::aws:policy/X"));
        let bob = Principal::user("bob").unwrap();

        let err = api.delete_principal(&bob).await.unwrap_err();
        assert!(matches!(err, IamError::Service { ref code, .. } if code == "DeleteConflict"));

        api.detach_policy(&bob, "arn:aws:iam::aws:policy/X").await.unwrap();
        api.delete_principal(&bob).await.unwrap();
        assert!(!api.exists(&bob));

        assert!(api.delete_principal(&bob).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let api = MockIamApi::new()
            .with_user("carol", |u| u.access_keys = vec!["K1".into(), "K2".into()])
            .failing_on("delete_access_key", "K1", IamError::AccessDenied("K1".into()));

        assert!(api.delete_access_key("carol", "K1").await.is_err());
        assert!(api.delete_access_key("carol", "K2").await.is_ok());
        assert_eq!(api.mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_membership_removed_on_both_sides() {
        let api = MockIamApi::new()
            .with_user("bob", |u| u.memberships = vec!["dev".into()])
            .with_group("dev", |g| g.memberships = vec!["bob".into()]);
        let dev = Principal::group("dev").unwrap();

        api.remove_membership(&dev, "bob").await.unwrap();

        let bob = api.principal(&Principal::user("bob").unwrap()).unwrap();
        assert!(bob.memberships.is_empty());
    }
}
