//! JSON-RPC parsing and classification: the first step of the per-message
//! decision loop.

use serde_json::Value;

/// What one inbound line/body turned out to be, once parsed.
#[derive(Debug, Clone)]
pub enum ClassifiedMessage {
    /// `serde_json` could not parse the bytes as JSON at all.
    ParseFailed,
    /// Valid JSON but not a JSON-RPC request object (e.g. a bare response,
    /// a notification with no interesting method).
    NonRequest { raw: Value },
    /// A JSON-RPC request whose method is not `tools/call`.
    RequestNonToolCall {
        id: Option<Value>,
        method: String,
        raw: Value,
    },
    /// A JSON-RPC request for `tools/call`, with `params.name` / `params.arguments` extracted.
    RequestToolCall {
        id: Option<Value>,
        tool_name: String,
        arguments: Option<Value>,
        raw: Value,
    },
}

/// Parse and classify one message. Never fails: an unparseable line becomes
/// `ParseFailed` so the caller can forward it unexamined rather than drop it.
pub fn classify(raw_line: &str) -> ClassifiedMessage {
    let value: Value = match serde_json::from_str(raw_line) {
        Ok(v) => v,
        Err(_) => return ClassifiedMessage::ParseFailed,
    };

    let Some(method) = value.get("method").and_then(Value::as_str) else {
        return ClassifiedMessage::NonRequest { raw: value };
    };

    let id = value.get("id").cloned();

    if method != "tools/call" {
        return ClassifiedMessage::RequestNonToolCall {
            id,
            method: method.to_string(),
            raw: value,
        };
    }

    let params = value.get("params");
    let tool_name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let arguments = params.and_then(|p| p.get("arguments")).cloned();

    ClassifiedMessage::RequestToolCall {
        id,
        tool_name,
        arguments,
        raw: value,
    }
}

/// Build the synthetic JSON-RPC error response for a policy/risk denial.
pub fn deny_response(id: Option<Value>, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": {
            "code": -32600,
            "message": message,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_parse_failed() {
        assert!(matches!(classify("not json"), ClassifiedMessage::ParseFailed));
    }

    #[test]
    fn bare_value_with_no_method_is_non_request() {
        assert!(matches!(
            classify(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#),
            ClassifiedMessage::NonRequest { .. }
        ));
    }

    #[test]
    fn non_tool_call_method_is_classified() {
        match classify(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#) {
            ClassifiedMessage::RequestNonToolCall { method, .. } => assert_eq!(method, "initialize"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tools_call_extracts_name_and_arguments() {
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"DeleteFile","arguments":{"path":"/tmp/x"}}}"#;
        match classify(line) {
            ClassifiedMessage::RequestToolCall {
                tool_name,
                arguments,
                ..
            } => {
                assert_eq!(tool_name, "DeleteFile");
                assert_eq!(arguments.unwrap()["path"], "/tmp/x");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
