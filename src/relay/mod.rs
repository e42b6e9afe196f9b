//! The shared decision core driving both transports.

pub mod http;
pub mod interceptor;
pub mod logger;
pub mod stdio;

pub use logger::{AuditLogger, RecordFields};

use std::sync::Arc;

use serde_json::Value;

use crate::ledger::{Direction, Verdict as LedgerVerdict};
use crate::policy::{self, Policy};
use crate::risk::{BehaviorStore, RiskEngine, RiskVerdict};

use interceptor::{classify, deny_response, ClassifiedMessage};

/// Coerce a JSON-RPC id into the bare string the audit ledger's
/// `message_id` field stores: the inner text for a string id, the JSON
/// rendering otherwise (so `1` becomes `"1"` but `"req-1"` stays `req-1`).
fn stringify_message_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What the decision core wants the transport to do with one inbound message.
pub enum Outcome {
    /// Forward the original bytes/value upstream unmodified.
    Forward(Value),
    /// Respond immediately with this JSON-RPC error; do not forward.
    Deny(Value),
}

/// Everything the decision core needs for one request, independent of
/// transport. Cheap to clone (all fields are `Arc`s) so both transports can
/// hand a copy to each tokio task handling one connection/child process.
pub struct DecisionCore<B: BehaviorStore> {
    pub policy: Arc<Policy>,
    pub risk: Arc<RiskEngine<B>>,
    pub logger: Arc<AuditLogger>,
    pub server_name: String,
}

impl<B: BehaviorStore> Clone for DecisionCore<B> {
    fn clone(&self) -> Self {
        Self {
            policy: Arc::clone(&self.policy),
            risk: Arc::clone(&self.risk),
            logger: Arc::clone(&self.logger),
            server_name: self.server_name.clone(),
        }
    }
}

impl<B: BehaviorStore> DecisionCore<B> {
    /// Run the per-message decision loop on one inbound line/body: classify
    /// it, evaluate policy, then (for tool calls) risk-score it before
    /// deciding whether to forward or deny.
    pub fn decide_request(&self, raw_line: &str, subject_id: &str, now_ms: i64) -> Outcome {
        match classify(raw_line) {
            ClassifiedMessage::ParseFailed => {
                // Never drop an unparseable message; there is nothing
                // structured enough here to build a ledger record from.
                Outcome::Forward(Value::String(raw_line.to_string()))
            }
            ClassifiedMessage::NonRequest { raw } => Outcome::Forward(raw),
            ClassifiedMessage::RequestNonToolCall { id, method, raw } => {
                let verdict = policy::evaluate(&self.policy, &self.server_name, None);
                if verdict == policy::Verdict::Deny {
                    return self.deny(id, method, None, None, None, None);
                }
                let _ = self.logger.log_or_degrade(RecordFields {
                    server_name: self.server_name.to_string(),
                    direction: Direction::Request,
                    method,
                    message_id: id.map(|v| stringify_message_id(&v)),
                    tool_name: None,
                    arguments_json: None,
                    response_json: None,
                    verdict: LedgerVerdict::Passthrough,
                    risk_score: None,
                    risk_level: None,
                });
                Outcome::Forward(raw)
            }
            ClassifiedMessage::RequestToolCall {
                id,
                tool_name,
                arguments,
                raw,
            } => self.decide_tool_call(id, tool_name, arguments, raw, subject_id, now_ms),
        }
    }

    fn decide_tool_call(
        &self,
        id: Option<Value>,
        tool_name: String,
        arguments: Option<Value>,
        raw: Value,
        subject_id: &str,
        now_ms: i64,
    ) -> Outcome {
        let policy_verdict = policy::evaluate(&self.policy, &self.server_name, Some(&tool_name));
        if policy_verdict == policy::Verdict::Deny {
            return self.deny(
                id,
                "tools/call".to_string(),
                Some(tool_name),
                arguments,
                None,
                None,
            );
        }

        let arguments_json = arguments.as_ref().map(|v| v.to_string());
        let risk_score = match self.risk.score(
            &tool_name,
            arguments_json.as_deref(),
            subject_id,
            now_ms,
        ) {
            Ok(score) => score,
            Err(_) => {
                // Risk scoring only ever fails on an I/O error in the behavior
                // store; fail open on this non-security path and allow.
                let _ = self.logger.log_or_degrade(RecordFields {
                    server_name: self.server_name.to_string(),
                    direction: Direction::Request,
                    method: "tools/call".to_string(),
                    message_id: id.map(|v| stringify_message_id(&v)),
                    tool_name: Some(tool_name),
                    arguments_json,
                    response_json: None,
                    verdict: LedgerVerdict::Allow,
                    risk_score: None,
                    risk_level: None,
                });
                return Outcome::Forward(raw);
            }
        };
        let risk_verdict = self.risk.evaluate(&risk_score);

        if risk_verdict == RiskVerdict::Deny {
            return self.deny(
                id,
                "tools/call".to_string(),
                Some(tool_name),
                arguments,
                Some(risk_score.score),
                Some(risk_score.level),
            );
        }

        if risk_verdict == RiskVerdict::Flag {
            tracing::warn!(tool = %tool_name, score = risk_score.score, "flagged high-risk tool call");
        }

        let _ = self.logger.log_or_degrade(RecordFields {
            server_name: self.server_name.to_string(),
            direction: Direction::Request,
            method: "tools/call".to_string(),
            message_id: id.map(|v| stringify_message_id(&v)),
            tool_name: Some(tool_name),
            arguments_json,
            response_json: None,
            verdict: LedgerVerdict::Allow,
            risk_score: Some(risk_score.score),
            risk_level: Some(risk_score.level),
        });

        Outcome::Forward(raw)
    }

    fn deny(
        &self,
        id: Option<Value>,
        method: String,
        tool_name: Option<String>,
        arguments: Option<Value>,
        risk_score: Option<u8>,
        risk_level: Option<crate::risk::RiskLevel>,
    ) -> Outcome {
        let arguments_json = arguments.as_ref().map(|v| v.to_string());
        let response = deny_response(id.clone(), "tool call denied by policy");

        let _ = self.logger.log_or_degrade(RecordFields {
            server_name: self.server_name.to_string(),
            direction: Direction::Request,
            method: method.clone(),
            message_id: id.clone().map(|v| stringify_message_id(&v)),
            tool_name: tool_name.clone(),
            arguments_json,
            response_json: None,
            verdict: LedgerVerdict::Deny,
            risk_score,
            risk_level,
        });
        let _ = self.logger.log_or_degrade(RecordFields {
            server_name: self.server_name.to_string(),
            direction: Direction::Response,
            method,
            message_id: id.map(|v| stringify_message_id(&v)),
            tool_name,
            arguments_json: None,
            response_json: Some(response.to_string()),
            verdict: LedgerVerdict::Deny,
            risk_score,
            risk_level,
        });

        Outcome::Deny(response)
    }

    /// Log an upstream reply as a passthrough response record.
    pub fn record_response(&self, method: &str, message_id: Option<&Value>, response_json: &str) {
        let _ = self.logger.log_or_degrade(RecordFields {
            server_name: self.server_name.to_string(),
            direction: Direction::Response,
            method: method.to_string(),
            message_id: message_id.map(stringify_message_id),
            tool_name: None,
            arguments_json: None,
            response_json: Some(response_json.to_string()),
            verdict: LedgerVerdict::Passthrough,
            risk_score: None,
            risk_level: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ed25519::KeyPair;
    use crate::ledger::LedgerStore;
    use crate::policy::{Action, ServerPolicy, ToolRule};
    use crate::risk::SqliteBehaviorStore;

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

    fn logger_fixture() -> AuditLogger {
        AuditLogger::new(
            LedgerStore::open_in_memory().unwrap(),
            KeyPair::generate(),
            "policyhash".to_string(),
        )
    }

    fn risk_fixture() -> RiskEngine<SqliteBehaviorStore> {
        RiskEngine::new(SqliteBehaviorStore::open_in_memory().unwrap())
    }

    #[test]
    fn parse_failure_forwards_unexamined() {
        let policy = policy_fixture();
        let logger = logger_fixture();
        let risk = risk_fixture();
        let core = DecisionCore {
            policy: Arc::new(policy),
            risk: Arc::new(risk),
            logger: Arc::new(logger),
            server_name: "builder-mcp".to_string(),
        };
        assert!(matches!(
            core.decide_request("not json", "agent-1", 0),
            Outcome::Forward(_)
        ));
    }

    #[test]
    fn policy_deny_short_circuits_risk_and_appends_two_records() {
        let policy = policy_fixture();
        let logger = logger_fixture();
        let risk = risk_fixture();
        let core = DecisionCore {
            policy: Arc::new(policy),
            risk: Arc::new(risk),
            logger: Arc::new(logger),
            server_name: "builder-mcp".to_string(),
        };
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"DeleteFile","arguments":{}}}"#;
        match core.decide_request(line, "agent-1", 0) {
            Outcome::Deny(resp) => assert_eq!(resp["error"]["code"], -32600),
            Outcome::Forward(_) => panic!("expected deny, got a forward"),
        }
        assert!(!core.logger.is_degraded());
    }

    #[test]
    fn allowed_tool_call_forwards_and_logs() {
        let policy = policy_fixture();
        let logger = logger_fixture();
        let risk = risk_fixture();
        let core = DecisionCore {
            policy: Arc::new(policy),
            risk: Arc::new(risk),
            logger: Arc::new(logger),
            server_name: "builder-mcp".to_string(),
        };
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"ReadFile","arguments":{}}}"#;
        assert!(matches!(
            core.decide_request(line, "agent-1", 0),
            Outcome::Forward(_)
        ));
    }

    #[test]
    fn string_message_ids_are_stored_unquoted() {
        let db_path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let policy = policy_fixture();
        let logger = AuditLogger::new(
            LedgerStore::open(&db_path).unwrap(),
            KeyPair::generate(),
            "policyhash".to_string(),
        );
        let risk = risk_fixture();
        let core = DecisionCore {
            policy: Arc::new(policy),
            risk: Arc::new(risk),
            logger: Arc::new(logger),
            server_name: "builder-mcp".to_string(),
        };
        let line = r#"{"jsonrpc":"2.0","id":"req-1","method":"tools/call","params":{"name":"ReadFile","arguments":{}}}"#;
        assert!(matches!(
            core.decide_request(line, "agent-1", 0),
            Outcome::Forward(_)
        ));

        let reopened = LedgerStore::open(&db_path).unwrap();
        let record = reopened.get_last(1).unwrap().remove(0);
        assert_eq!(record.message_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn stringify_message_id_unwraps_string_ids_but_renders_other_kinds() {
        assert_eq!(stringify_message_id(&Value::String("req-1".to_string())), "req-1");
        assert_eq!(stringify_message_id(&serde_json::json!(1)), "1");
        assert_eq!(stringify_message_id(&Value::Null), "null");
    }
}
