//! HTTP transport: local `POST /` JSON-RPC endpoint with bearer admission,
//! rate limiting, and SSE passthrough to a configured upstream.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::admission::{resolve_bearer, AuthStore, RateLimiter};
use crate::risk::BehaviorStore;

use super::{DecisionCore, Outcome};

pub struct HttpState<B: BehaviorStore> {
    pub core: DecisionCore<B>,
    pub auth: Option<Arc<AuthStore>>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub upstream_url: String,
    pub http_client: reqwest::Client,
}

pub async fn serve<B>(addr: &str, state: HttpState<B>) -> crate::error::Result<()>
where
    B: BehaviorStore + 'static,
{
    let state = Arc::new(state);
    let app = Router::new()
        .route("/healthz", get(healthz::<B>))
        .route("/", post(handle_rpc::<B>))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(crate::error::WardenError::Io)?;
    axum::serve(listener, app)
        .await
        .map_err(crate::error::WardenError::Io)?;
    Ok(())
}

async fn healthz<B: BehaviorStore>(State(state): State<Arc<HttpState<B>>>) -> Response {
    if state.core.logger.is_degraded() {
        (StatusCode::SERVICE_UNAVAILABLE, "ledger degraded").into_response()
    } else {
        (StatusCode::OK, "ok").into_response()
    }
}

fn unauthorized(id: Option<Value>, message: &str) -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": { "code": -32001, "message": message }
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn rate_limited(id: Option<Value>, retry_after_secs: u32) -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": { "code": -32029, "message": "rate limit exceeded" }
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = retry_after_secs.to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}

async fn handle_rpc<B>(
    State(state): State<Arc<HttpState<B>>>,
    headers: HeaderMap,
    body: String,
) -> Response
where
    B: BehaviorStore + 'static,
{
    let parsed_id = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("id").cloned());

    let subject_id = if let Some(auth) = &state.auth {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let Some(token) = token else {
            return unauthorized(parsed_id, "missing bearer token");
        };
        let now_rfc3339 = chrono::Utc::now().to_rfc3339();
        match resolve_bearer(auth, token, &now_rfc3339) {
            Ok(Some(principal)) => principal,
            _ => return unauthorized(parsed_id, "invalid, revoked, or expired bearer token"),
        }
    } else {
        crate::admission::Principal {
            kind: crate::admission::PrincipalKind::ApiKey,
            subject: "anonymous".to_string(),
            scopes: Vec::new(),
            rate_limit_rpm: None,
        }
    };

    if let Some(limiter) = &state.rate_limiter {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let decision = limiter.check(&subject_id.subject, subject_id.rate_limit_rpm, now_ms);
        if !decision.allowed {
            return rate_limited(parsed_id, decision.retry_after_secs);
        }
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    match state.core.decide_request(&body, &subject_id.subject, now_ms) {
        Outcome::Deny(response) => (StatusCode::OK, Json(response)).into_response(),
        Outcome::Forward(request_value) => forward_upstream(&state, request_value).await,
    }
}

async fn forward_upstream<B>(state: &Arc<HttpState<B>>, request_value: Value) -> Response
where
    B: BehaviorStore + 'static,
{
    let method = request_value
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message_id = request_value.get("id").cloned();

    let upstream = state
        .http_client
        .post(&state.upstream_url)
        .json(&request_value)
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            let body = serde_json::json!({
                "jsonrpc": "2.0",
                "id": message_id.unwrap_or(Value::Null),
                "error": { "code": -32002, "message": format!("upstream request failed: {e}") }
            });
            return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
        }
    };

    let content_type = upstream
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("text/event-stream") {
        // Stream state: the upstream byte stream, an undelivered-bytes
        // buffer, and what's needed to log each complete frame as a
        // response record.
        let state_tuple = (
            upstream.bytes_stream(),
            Vec::<u8>::new(),
            state.core.clone(),
            method,
            message_id,
        );
        let stream = futures_util::stream::unfold(state_tuple, |(mut byte_stream, mut buffer, core, method, message_id)| async move {
            loop {
                if let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
                    let frame: Vec<u8> = buffer.drain(..pos + 2).collect();
                    if let Some(data) = extract_sse_data(&frame[..frame.len() - 2]) {
                        core.record_response(&method, message_id.as_ref(), &data);
                    }
                    let chunk = bytes::Bytes::from(frame);
                    return Some((Ok::<_, std::io::Error>(chunk), (byte_stream, buffer, core, method, message_id)));
                }
                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(_)) | None => {
                        if buffer.is_empty() {
                            return None;
                        }
                        let rest = std::mem::take(&mut buffer);
                        return Some((Ok(bytes::Bytes::from(rest)), (byte_stream, buffer, core, method, message_id)));
                    }
                }
            }
        });
        return Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/event-stream")
            .body(Body::from_stream(stream))
            .expect("static headers are always valid");
    }

    let response_bytes = match upstream.bytes().await {
        Ok(b) => b,
        Err(e) => {
            let body = serde_json::json!({
                "jsonrpc": "2.0",
                "id": message_id.unwrap_or(Value::Null),
                "error": { "code": -32002, "message": format!("upstream response read failed: {e}") }
            });
            return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
        }
    };

    let response_text = String::from_utf8_lossy(&response_bytes).to_string();
    state
        .core
        .record_response(&method, message_id.as_ref(), &response_text);

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(Body::from(response_bytes))
        .expect("static headers are always valid")
}

fn extract_sse_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data_lines = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_data_line() {
        let frame = b"event: message\ndata: {\"ok\":true}\n\n";
        assert_eq!(
            extract_sse_data(frame),
            Some(r#"{"ok":true}"#.to_string())
        );
    }

    #[test]
    fn joins_multi_line_data() {
        let frame = b"data: line one\ndata: line two\n\n";
        assert_eq!(extract_sse_data(frame), Some("line one\nline two".to_string()));
    }

    #[test]
    fn frame_without_data_is_none() {
        let frame = b": comment only\n\n";
        assert_eq!(extract_sse_data(frame), None);
    }
}
