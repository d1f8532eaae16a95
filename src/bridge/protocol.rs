//! Newline-delimited JSON framing for the interpreter channel
//!
//! Requests are `{"id", "method", "params"}` objects, one per line. Replies
//! carry the request id and either a `result` (possibly `null`) or an
//! `error` object. Objects without an id whose method is `log` are log
//! records emitted by the interpreter.

use serde::Serialize;
use serde_json::Value;

use crate::errors::{ErrorKind, ErrorLayer, LspError, LspResult};

/// One outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

/// One decoded inbound line.
#[derive(Debug)]
pub enum BridgeResponse {
    Reply { id: u64, outcome: LspResult<Value> },
    Log { level: String, message: String },
}

/// Serializes a request as a single line including the trailing newline.
pub fn encode_request(id: u64, method: &str, params: &Value) -> LspResult<String> {
    let mut line = serde_json::to_string(&BridgeRequest { id, method, params })?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line of interpreter output.
///
/// Errors are framing failures that cannot be attributed to a call. A reply
/// that can be attributed but has neither `result` nor `error` yields a
/// `bridge` protocol error as that call's outcome.
pub fn decode_line(line: &str) -> LspResult<BridgeResponse> {
    let value: Value = serde_json::from_str(line.trim()).map_err(|e| {
        LspError::bridge(ErrorKind::Protocol, format!("Malformed interpreter output: {}", truncate(line)))
            .with_cause(e.into())
    })?;
    let Value::Object(mut object) = value else {
        return Err(LspError::bridge(
            ErrorKind::Protocol,
            format!("Expected a JSON object, got: {}", truncate(line)),
        ));
    };

    let Some(id) = object.get("id").and_then(Value::as_u64) else {
        if object.get("method").and_then(Value::as_str) == Some("log") {
            let params = object.remove("params").unwrap_or(Value::Null);
            return Ok(BridgeResponse::Log {
                level: params
                    .get("level")
                    .and_then(Value::as_str)
                    .unwrap_or("info")
                    .to_string(),
                message: params
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        return Err(LspError::bridge(
            ErrorKind::Protocol,
            format!("Reply without a numeric id: {}", truncate(line)),
        ));
    };

    let outcome = if let Some(error) = object.remove("error") {
        Err(pike_error(&error))
    } else if let Some(result) = object.remove("result") {
        Ok(result)
    } else {
        Err(LspError::bridge(
            ErrorKind::Protocol,
            format!("Reply {} has neither 'result' nor 'error'", id),
        ))
    };
    Ok(BridgeResponse::Reply { id, outcome })
}

fn pike_error(error: &Value) -> LspError {
    let message = match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    };
    let kind = match error.get("code").and_then(Value::as_str) {
        Some("unavailable") => ErrorKind::Unavailable,
        _ => ErrorKind::Analysis,
    };
    LspError::new(ErrorLayer::Pike, kind, message)
}

fn truncate(line: &str) -> String {
    const MAX: usize = 120;
    let line = line.trim();
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        format!("{}...", line.chars().take(MAX).collect::<String>())
    }
}
