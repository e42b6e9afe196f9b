use std::sync::Arc;

use warden::crypto::ed25519::KeyPair;
use warden::ledger::{verify_chain, LedgerStore, Verdict};
use warden::policy::{Action, Policy, ServerPolicy, ToolRule};
use warden::relay::{AuditLogger, DecisionCore, Outcome};
use warden::risk::{RiskEngine, SqliteBehaviorStore};

fn policy_fixture() -> Policy {
    Policy {
        schema_version: 1,
        data_dir: "/tmp".to_string(),
        log_level: "info".to_string(),
        rate_limit: None,
        servers: vec![ServerPolicy {
            server: "builder-mcp".to_string(),
            default: Action::Allow,
            tools: vec![ToolRule {
                tool: "DeleteFile".to_string(),
                action: Action::Deny,
            }],
        }],
    }
}

fn core_for(policy: Policy, logger: AuditLogger, server_name: &str) -> DecisionCore<SqliteBehaviorStore> {
    DecisionCore {
        policy: Arc::new(policy),
        risk: Arc::new(RiskEngine::new(SqliteBehaviorStore::open_in_memory().unwrap())),
        logger: Arc::new(logger),
        server_name: server_name.to_string(),
    }
}

/// S1/S3: a denied tool call never reaches the upstream and leaves behind a
/// request+response pair of signed, chained ledger records that verify
/// cleanly when read back from a fresh handle on the same database file.
#[test]
fn denied_tool_call_is_fully_audited_and_chain_verifies() {
    let db_path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let logger = AuditLogger::new(
        LedgerStore::open(&db_path).unwrap(),
        KeyPair::generate(),
        "policyhash".to_string(),
    );
    let core = core_for(policy_fixture(), logger, "builder-mcp");

    let line = r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"DeleteFile","arguments":{"path":"/etc/passwd"}}}"#;
    match core.decide_request(line, "agent-1", 0) {
        Outcome::Deny(resp) => assert_eq!(resp["error"]["code"], -32600),
        Outcome::Forward(_) => panic!("expected a denial"),
    }
    assert!(!core.logger.is_degraded());

    let reopened = LedgerStore::open(&db_path).unwrap();
    let records = reopened.get_all().unwrap();
    assert_eq!(records.len(), 2, "expected a request and a response record");
    assert!(records.iter().all(|r| r.verdict == Verdict::Deny));

    let violations = verify_chain(&records).unwrap();
    assert!(violations.is_empty(), "chain should verify cleanly: {violations:?}");
}

/// S2/S4: a harmless tool call with no matching tool rule falls through to
/// the server default, forwards, and logs a low-risk allow record.
#[test]
fn allowed_tool_call_logs_risk_score_and_forwards() {
    let logger = AuditLogger::new(
        LedgerStore::open_in_memory().unwrap(),
        KeyPair::generate(),
        "policyhash".to_string(),
    );
    let core = core_for(policy_fixture(), logger, "builder-mcp");

    let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"ReadFile","arguments":{}}}"#;
    match core.decide_request(line, "agent-2", 0) {
        Outcome::Forward(value) => assert_eq!(value["params"]["name"], "ReadFile"),
        Outcome::Deny(_) => panic!("expected forward"),
    }
    assert!(!core.logger.is_degraded());
}

/// Invariant 4: a server with no matching policy entry fails closed even for
/// an otherwise harmless tool call.
#[test]
fn unknown_server_fails_closed() {
    let policy = Policy {
        schema_version: 1,
        data_dir: "/tmp".to_string(),
        log_level: "info".to_string(),
        rate_limit: None,
        servers: vec![ServerPolicy {
            server: "only-known-mcp".to_string(),
            default: Action::Allow,
            tools: vec![],
        }],
    };
    let logger = AuditLogger::new(
        LedgerStore::open_in_memory().unwrap(),
        KeyPair::generate(),
        "policyhash".to_string(),
    );
    let core = core_for(policy, logger, "unregistered-mcp");

    let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"ReadFile","arguments":{}}}"#;
    match core.decide_request(line, "agent-3", 0) {
        Outcome::Deny(resp) => assert_eq!(resp["error"]["code"], -32600),
        Outcome::Forward(_) => panic!("expected fail-closed denial"),
    }
}

/// A malformed line (not parseable JSON-RPC) is forwarded unexamined rather
/// than dropped, since there is nothing structured enough to audit.
#[test]
fn unparseable_line_passes_through_without_a_ledger_entry() {
    let logger = AuditLogger::new(
        LedgerStore::open_in_memory().unwrap(),
        KeyPair::generate(),
        "policyhash".to_string(),
    );
    let core = core_for(policy_fixture(), logger, "builder-mcp");

    assert!(matches!(
        core.decide_request("not json at all", "agent-4", 0),
        Outcome::Forward(_)
    ));
}

/// Invariant 7: repeated high-risk calls from the same subject escalate past
/// the deny threshold purely from behavior boost, even though each call's
/// base score alone would only be flagged.
#[test]
fn repeated_high_risk_calls_eventually_deny() {
    let policy = Policy {
        schema_version: 1,
        data_dir: "/tmp".to_string(),
        log_level: "info".to_string(),
        rate_limit: None,
        servers: vec![ServerPolicy {
            server: "builder-mcp".to_string(),
            default: Action::Allow,
            tools: vec![],
        }],
    };
    let logger = AuditLogger::new(
        LedgerStore::open_in_memory().unwrap(),
        KeyPair::generate(),
        "policyhash".to_string(),
    );
    let core = core_for(policy, logger, "builder-mcp");
    let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"DeleteFile","arguments":{}}}"#;

    let mut saw_deny = false;
    for i in 0..10 {
        if let Outcome::Deny(_) = core.decide_request(line, "repeat-offender", i * 1_000) {
            saw_deny = true;
            break;
        }
    }
    assert!(saw_deny, "expected repeated destructive calls to eventually be denied");
}
