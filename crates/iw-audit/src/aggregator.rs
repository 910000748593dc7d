//! Audit Aggregator
//!
//! Read-only. Every lookup must succeed except the access-key last-used
//! timestamp, which is best effort.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use iw_common::{Principal, PrincipalKind};
use iw_iam::{collect_pages, IamApi, IamError, IamResult};

use crate::snapshot::{AttachedPolicy, AuditSnapshot, GroupSnapshot, UserSnapshot};
use crate::AuditError;

pub struct AuditAggregator<'a> {
    api: &'a dyn IamApi,
}

impl<'a> AuditAggregator<'a> {
    pub fn new(api: &'a dyn IamApi) -> Self {
        Self { api }
    }

    pub async fn audit(&self, principal: &Principal) -> Result<AuditSnapshot, AuditError> {
        debug!(principal = %principal, "Auditing");
        match principal.kind() {
            PrincipalKind::User => self.audit_user(principal).await.map(AuditSnapshot::User),
            PrincipalKind::Group => self.audit_group(principal).await.map(AuditSnapshot::Group),
        }
    }

    async fn audit_user(&self, principal: &Principal) -> Result<UserSnapshot, AuditError> {
        let api = self.api;
        let fail = |operation: &'static str| {
            let principal = principal.clone();
            move |source: IamError| AuditError::Read { operation, principal, source }
        };

        let details = api.get_principal(principal).await.map_err(fail("GetUser"))?;
        let access_key_last_used = self.access_key_last_used(principal.name()).await;

        let attached_policies =
            collect_pages(|marker| async move { api.list_attached_policies(principal, marker).await })
                .await
                .map_err(fail("ListAttachedUserPolicies"))?;
        let policies = collect_pages(|marker| async move { api.list_inline_policies(principal, marker).await })
            .await
            .map_err(fail("ListUserPolicies"))?;
        let groups = collect_pages(|marker| async move { api.list_memberships(principal, marker).await })
            .await
            .map_err(fail("ListGroupsForUser"))?;

        Ok(UserSnapshot {
            user_name: details.name,
            user_id: details.id,
            arn: details.arn,
            path: details.path,
            create_date: details.create_date,
            password_last_used: details.password_last_used,
            access_key_last_used,
            attached_policies: attached_policies.into_iter().map(AttachedPolicy::from).collect(),
            policies,
            groups,
        })
    }

    async fn audit_group(&self, principal: &Principal) -> Result<GroupSnapshot, AuditError> {
        let api = self.api;
        let fail = |operation: &'static str| {
            let principal = principal.clone();
            move |source: IamError| AuditError::Read { operation, principal, source }
        };

        let details = api.get_principal(principal).await.map_err(fail("GetGroup"))?;
        let users = collect_pages(|marker| async move { api.list_memberships(principal, marker).await })
            .await
            .map_err(fail("GetGroup"))?;
        let attached_policies =
            collect_pages(|marker| async move { api.list_attached_policies(principal, marker).await })
                .await
                .map_err(fail("ListAttachedGroupPolicies"))?;
        let policies = collect_pages(|marker| async move { api.list_inline_policies(principal, marker).await })
            .await
            .map_err(fail("ListGroupPolicies"))?;

        Ok(GroupSnapshot {
            group_name: details.name,
            group_id: details.id,
            arn: details.arn,
            path: details.path,
            create_date: details.create_date,
            attached_policies: attached_policies.into_iter().map(AttachedPolicy::from).collect(),
            policies,
            users,
        })
    }

    /// Latest use across the user's access keys.
    ///
    /// `None` when there are no keys, none was ever used, or any lookup
    /// fails; only failures other than "not found" are logged.
    async fn access_key_last_used(&self, user_name: &str) -> Option<DateTime<Utc>> {
        match self.try_access_key_last_used(user_name).await {
            Ok(last_used) => last_used,
            Err(IamError::NotFound(_)) => None,
            Err(e) => {
                warn!(user = %user_name, error = %e, "Could not determine access key last use");
                None
            }
        }
    }

    async fn try_access_key_last_used(&self, user_name: &str) -> IamResult<Option<DateTime<Utc>>> {
        let api = self.api;
        let keys = collect_pages(|marker| async move { api.list_access_keys(user_name, marker).await }).await?;

        let mut latest = None;
        for key in &keys {
            match api.get_access_key_last_used(key).await {
                Ok(used) => latest = latest.max(used),
                Err(IamError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(latest)
    }
}
