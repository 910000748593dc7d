//! Audit snapshot model
//!
//! Keys follow the provider's PascalCase field names. Optional fields are
//! omitted when absent and timestamps render as `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use iw_iam::AttachedPolicyRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedPolicy {
    pub policy_name: String,
    pub policy_arn: String,
}

impl From<AttachedPolicyRef> for AttachedPolicy {
    fn from(policy: AttachedPolicyRef) -> Self {
        Self {
            policy_name: policy.policy_name,
            policy_arn: policy.policy_arn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserSnapshot {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub create_date: DateTime<Utc>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "timestamp::serialize_option"
    )]
    pub password_last_used: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "timestamp::serialize_option"
    )]
    pub access_key_last_used: Option<DateTime<Utc>>,
    pub attached_policies: Vec<AttachedPolicy>,
    /// Inline policy names
    pub policies: Vec<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupSnapshot {
    pub group_name: String,
    pub group_id: String,
    pub arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub create_date: DateTime<Utc>,
    pub attached_policies: Vec<AttachedPolicy>,
    pub policies: Vec<String>,
    /// Member user names
    pub users: Vec<String>,
}

/// Read-only view of one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuditSnapshot {
    User(UserSnapshot),
    Group(GroupSnapshot),
}

impl AuditSnapshot {
    pub fn name(&self) -> &str {
        match self {
            AuditSnapshot::User(user) => &user.user_name,
            AuditSnapshot::Group(group) => &group.group_name,
        }
    }

    /// Nested key/value form of the snapshot
    pub fn to_map(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "snapshot serialized to a non-object: {}",
                other
            ))),
        }
    }
}

pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn serialize_option<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> UserSnapshot {
        UserSnapshot {
            user_name: "dave".to_string(),
            user_id: "AIDADAVE".to_string(),
            arn: "arn:aws:iam::123456789012:user/dave".to_string(),
            path: None,
            create_date: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            password_last_used: None,
            access_key_last_used: Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()),
            attached_policies: vec![AttachedPolicy {
                policy_name: "ReadOnlyAccess".to_string(),
                policy_arn: "arn:aws:iam::aws:policy/ReadOnlyAccess".to_string(),
            }],
            policies: vec!["Inline".to_string()],
            groups: vec![],
        }
    }

    #[test]
    fn test_user_map_keys_and_timestamps() {
        let map = AuditSnapshot::User(user()).to_map().unwrap();

        assert_eq!(map["UserName"], "dave");
        assert_eq!(map["UserId"], "AIDADAVE");
        assert_eq!(map["CreateDate"], "2021-03-04T05:06:07Z");
        assert_eq!(map["AccessKeyLastUsed"], "2024-12-31T23:59:59Z");
        assert_eq!(map["AttachedPolicies"][0]["PolicyArn"], "arn:aws:iam::aws:policy/ReadOnlyAccess");
        assert_eq!(map["Groups"], serde_json::json!([]));
        assert!(!map.contains_key("Path"));
        assert!(!map.contains_key("PasswordLastUsed"));
    }

    #[test]
    fn test_group_map() {
        let group = GroupSnapshot {
            group_name: "dev".to_string(),
            group_id: "AGPADEV".to_string(),
            arn: "arn:aws:iam::123456789012:group/dev".to_string(),
            path: Some("/".to_string()),
            create_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            attached_policies: vec![],
            policies: vec![],
            users: vec!["bob".to_string()],
        };

        let map = AuditSnapshot::Group(group).to_map().unwrap();

        assert_eq!(map["GroupName"], "dev");
        assert_eq!(map["Path"], "/");
        assert_eq!(map["Users"], serde_json::json!(["bob"]));
        assert!(!map.contains_key("UserName"));
    }
}
