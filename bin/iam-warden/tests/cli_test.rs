use iam_warden::{run, Command, ExitCode};
use iw_config::OutputConfig;
use iw_iam::mock::MockIamApi;
use iw_iam::IamError;

fn decommission_user(name: &str, dry_run: bool) -> Command {
    Command::Decommission {
        user_name: Some(name.to_string()),
        group_name: None,
        dry_run,
    }
}

fn audit(users: &[&str], groups: &[&str], compact: bool) -> Command {
    Command::Audit {
        user_name: users.iter().map(|s| s.to_string()).collect(),
        group_name: groups.iter().map(|s| s.to_string()).collect(),
        compact,
    }
}

async fn run_captured(command: Command, api: &MockIamApi) -> (ExitCode, String) {
    let mut out = Vec::new();
    let code = run(&command, api, &OutputConfig::default(), &mut out).await;
    (code, String::from_utf8(out).unwrap())
}

fn alice_api() -> MockIamApi {
    MockIamApi::new().with_user("alice", |u| {
        u.login_profile = true;
        u.access_keys = vec!["AKIA1".into(), "AKIA2".into()];
        u.inline_policies = vec!["ReadOnly".into()];
    })
}

#[tokio::test]
async fn test_dry_run_prints_plan() {
    let api = alice_api();

    let (code, out) = run_captured(decommission_user("alice", true), &api).await;

    assert_eq!(code, ExitCode::Success);
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "aws iam delete-access-key --user-name alice --access-key-id AKIA1");
    assert_eq!(lines[4], "aws iam delete-user --user-name alice");
    assert!(api.mutations().is_empty());
}

#[tokio::test]
async fn test_execute_is_quiet_on_success() {
    let api = alice_api();

    let (code, out) = run_captured(decommission_user("alice", false), &api).await;

    assert_eq!(code, ExitCode::Success);
    assert!(out.is_empty());
    assert_eq!(api.call_count("delete_principal"), 1);
}

#[tokio::test]
async fn test_exit_codes_for_failures() {
    let api = alice_api().failing_on("delete_inline_policy", "ReadOnly", IamError::Throttled("slow".into()));
    let (code, _) = run_captured(decommission_user("alice", false), &api).await;
    assert_eq!(code, ExitCode::TerminalFailure);

    // A deactivated virtual device does not block the user delete
    let serial = "arn:aws:iam::123456789012:mfa/alice";
    let api = MockIamApi::new()
        .with_user("alice", |u| u.mfa_devices = vec![serial.into()])
        .failing_on("delete_virtual_mfa_device", serial, IamError::AccessDenied("denied".into()));
    let (code, _) = run_captured(decommission_user("alice", false), &api).await;
    assert_eq!(code, ExitCode::StepFailures);
}

#[tokio::test]
async fn test_blank_and_missing_principals() {
    let api = alice_api();

    let (code, _) = run_captured(decommission_user("   ", true), &api).await;
    assert_eq!(code, ExitCode::InputError);
    assert!(api.calls().is_empty());

    let (code, _) = run_captured(decommission_user("nobody", false), &api).await;
    assert_eq!(code, ExitCode::PrincipalNotFound);

    let (code, _) = run_captured(audit(&[], &[], false), &api).await;
    assert_eq!(code, ExitCode::InputError);
}

#[tokio::test]
async fn test_audit_users_then_groups() {
    let api = MockIamApi::new()
        .with_user("dave", |u| u.memberships = vec!["dev".into()])
        .with_group("dev", |g| g.memberships = vec!["dave".into()]);

    let (code, out) = run_captured(audit(&["dave"], &["dev"], true), &api).await;

    assert_eq!(code, ExitCode::Success);
    let docs: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["UserName"], "dave");
    assert!(docs[0].get("AccessKeyLastUsed").is_none());
    assert_eq!(docs[1]["GroupName"], "dev");
    assert_eq!(docs[1]["Users"], serde_json::json!(["dave"]));
}

#[tokio::test]
async fn test_audit_continues_past_failures() {
    let api = MockIamApi::new().with_user("dave", |_| {});

    let (code, out) = run_captured(audit(&["ghost", "dave"], &[], true), &api).await;
    assert_eq!(code, ExitCode::PrincipalNotFound);
    assert_eq!(out.lines().count(), 1);

    let api = MockIamApi::new()
        .with_user("dave", |_| {})
        .failing("list_inline_policies", IamError::AccessDenied("ListUserPolicies".into()));
    let (code, out) = run_captured(audit(&["ghost", "dave"], &[], true), &api).await;
    assert_eq!(code, ExitCode::AuditFailed);
    assert!(out.is_empty());
}
