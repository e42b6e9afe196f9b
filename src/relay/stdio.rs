//! Line-delimited transport: spawn a child MCP server, pipe stdin/stdout
//! through the decision core, forward child stderr verbatim.

use std::process::Stdio;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::{Result, WardenError};
use crate::risk::BehaviorStore;

use super::{DecisionCore, Outcome};

/// Run the relay over a spawned child process until either side closes.
/// `subject_id_for` resolves a subject id per inbound line (stdio transport
/// has no bearer token, so callers typically pass a constant like `"local"`).
pub async fn run<B>(
    command: &str,
    args: &[String],
    core: DecisionCore<B>,
    subject_id: &str,
) -> Result<i32>
where
    B: BehaviorStore + 'static,
{
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(WardenError::Io)?;

    let mut child_stdin = child.stdin.take().expect("child stdin was piped");
    let child_stdout = child.stdout.take().expect("child stdout was piped");
    let child_stderr = child.stderr.take().expect("child stderr was piped");

    let response_core = core.clone();
    let server_to_client = tokio::spawn(async move {
        let core = response_core;
        let mut reader = BufReader::new(child_stdout).lines();
        let mut stdout = tokio::io::stdout();
        while let Ok(Some(line)) = reader.next_line().await {
            // Best-effort: a panic in response handling must still deliver
            // the upstream bytes; logging a reply is never allowed to block
            // forwarding it.
            let method_and_id = serde_json::from_str::<Value>(&line)
                .ok()
                .map(|v| (v.get("method").and_then(Value::as_str).unwrap_or("unknown").to_string(), v.get("id").cloned()));

            if let Some((method, id)) = method_and_id {
                core.record_response(&method, id.as_ref(), &line);
            }

            let _ = stdout.write_all(line.as_bytes()).await;
            let _ = stdout.write_all(b"\n").await;
            let _ = stdout.flush().await;
        }
    });

    let stderr_forward = tokio::spawn(async move {
        let mut reader = BufReader::new(child_stderr).lines();
        let mut stderr = tokio::io::stderr();
        while let Ok(Some(line)) = reader.next_line().await {
            let _ = stderr.write_all(line.as_bytes()).await;
            let _ = stderr.write_all(b"\n").await;
            let _ = stderr.flush().await;
        }
    });

    let subject_id = subject_id.to_string();
    let client_to_server = tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Ok(Some(line)) = reader.next_line().await {
            let now_ms = chrono::Utc::now().timestamp_millis();
            match core.decide_request(&line, &subject_id, now_ms) {
                Outcome::Forward(_) => {
                    let _ = child_stdin.write_all(line.as_bytes()).await;
                    let _ = child_stdin.write_all(b"\n").await;
                    let _ = child_stdin.flush().await;
                }
                Outcome::Deny(response) => {
                    let rendered = response.to_string();
                    let _ = stdout.write_all(rendered.as_bytes()).await;
                    let _ = stdout.write_all(b"\n").await;
                    let _ = stdout.flush().await;
                }
            }
        }
    });

    let _ = client_to_server.await;
    let _ = server_to_client.await;
    let _ = stderr_forward.await;

    let status = child.wait().await.map_err(WardenError::Io)?;
    Ok(status.code().unwrap_or(1))
}
