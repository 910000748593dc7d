use chrono::{TimeZone, Utc};

use iw_audit::{AuditAggregator, AuditError, AuditSnapshot};
use iw_common::Principal;
use iw_iam::mock::MockIamApi;
use iw_iam::IamError;

#[tokio::test]
async fn test_dave_never_used_key_omits_last_used() {
    let api = MockIamApi::new()
        .with_user("dave", |u| {
            u.access_keys = vec!["AKIADAVE".into()];
            u.inline_policies = vec!["DaveInline".into()];
            u.attach("arn:aws:iam::aws:policy/ReadOnlyAccess");
            u.memberships = vec!["dev".into()];
        });
    let dave = Principal::user("dave").unwrap();

    let snapshot = AuditAggregator::new(&api).audit(&dave).await.unwrap();
    let map = snapshot.to_map().unwrap();

    assert!(!map.contains_key("AccessKeyLastUsed"));
    assert_eq!(map["UserName"], "dave");
    assert_eq!(map["UserId"], "AIDADAVE");
    assert_eq!(map["Arn"], "arn:aws:iam::123456789012:user/dave");
    assert_eq!(map["CreateDate"], "2020-01-01T00:00:00Z");
    assert_eq!(map["Policies"], serde_json::json!(["DaveInline"]));
    assert_eq!(map["Groups"], serde_json::json!(["dev"]));
    assert_eq!(map["AttachedPolicies"][0]["PolicyName"], "ReadOnlyAccess");
    assert!(api.mutations().is_empty());
}

#[tokio::test]
async fn test_latest_key_use_wins() {
    let older = Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();
    let api = MockIamApi::new()
        .with_user("erin", |u| u.access_keys = vec!["AKIA1".into(), "AKIA2".into(), "AKIA3".into()])
        .with_key_last_used("AKIA1", older)
        .with_key_last_used("AKIA2", newer);
    let erin = Principal::user("erin").unwrap();

    let snapshot = AuditAggregator::new(&api).audit(&erin).await.unwrap();

    match snapshot {
        AuditSnapshot::User(user) => assert_eq!(user.access_key_last_used, Some(newer)),
        other => panic!("expected user snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_last_used_failure_is_tolerated() {
    let api = MockIamApi::new()
        .with_user("finn", |u| u.access_keys = vec!["AKIAF".into()])
        .with_key_last_used("AKIAF", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .failing("get_access_key_last_used", IamError::AccessDenied("GetAccessKeyLastUsed".into()));
    let finn = Principal::user("finn").unwrap();

    let map = AuditAggregator::new(&api).audit(&finn).await.unwrap().to_map().unwrap();

    assert!(!map.contains_key("AccessKeyLastUsed"));
    assert_eq!(map["UserName"], "finn");
}

#[tokio::test]
async fn test_other_read_failure_aborts_with_operation() {
    let api = MockIamApi::new()
        .with_user("gus", |_| {})
        .failing("list_memberships", IamError::AccessDenied("ListGroupsForUser".into()));
    let gus = Principal::user("gus").unwrap();

    let err = AuditAggregator::new(&api).audit(&gus).await.unwrap_err();

    let AuditError::Read { operation, principal, .. } = &err;
    assert_eq!(*operation, "ListGroupsForUser");
    assert_eq!(principal, &gus);
    assert!(err.to_string().contains("user gus"));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_missing_principal() {
    let api = MockIamApi::new();
    let ghost = Principal::group("ghost").unwrap();

    let err = AuditAggregator::new(&api).audit(&ghost).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_group_snapshot_paginates_members() {
    let members: Vec<String> = (0..5).map(|i| format!("user{i}")).collect();
    let api = MockIamApi::new().with_page_size(2).with_group("dev", |g| {
        g.memberships = members.clone();
        g.inline_policies = vec!["DevInline".into()];
    });
    let dev = Principal::group("dev").unwrap();

    let map = AuditAggregator::new(&api).audit(&dev).await.unwrap().to_map().unwrap();

    assert_eq!(map["GroupName"], "dev");
    assert_eq!(map["GroupId"], "AGPADEV");
    assert_eq!(map["Users"], serde_json::json!(members));
    assert_eq!(map["Policies"], serde_json::json!(["DevInline"]));
    assert_eq!(map["AttachedPolicies"], serde_json::json!([]));
}
