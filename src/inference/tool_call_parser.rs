//! Tool call parsing: normalizes provider output into `ToolCallResponse`s
//! and decodes their argument strings.
//!
//! Two entry points:
//!
//! 1. [`normalize_tool_calls`] canonicalizes the raw records a provider
//!    returned: every call gets a non-empty id unique within the batch, a
//!    `type` (default `"function"`), a string name and string arguments.
//!
//! 2. [`parse_tool_arguments`] turns an argument string into JSON. Direct
//!    parse first; on failure one pass of [`repair_json_string`] and a second
//!    parse, but only if the repair actually changed the text.

use std::collections::HashSet;

use uuid::Uuid;

use super::errors::InferenceError;
use super::json_repair::repair_json_string;
use super::types::{FunctionCallResponse, RawToolCall, ToolCallResponse};

// ─── Normalization ───────────────────────────────────────────────────────────

/// Generate a fresh tool call id.
fn generate_tool_call_id() -> String {
    format!("call_{}", Uuid::new_v4())
}

/// Render a loosely-typed id as a trimmed string (`null` → empty).
fn id_to_string(id: Option<&serde_json::Value>) -> String {
    match id {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Canonicalize the tool calls of one assistant turn, preserving order.
pub fn normalize_tool_calls(raw_calls: &[RawToolCall]) -> Vec<ToolCallResponse> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw_calls.len());
    let mut normalized = Vec::with_capacity(raw_calls.len());

    for raw in raw_calls {
        let mut id = id_to_string(raw.id.as_ref());
        if id.is_empty() {
            id = generate_tool_call_id();
        }
        while seen.contains(&id) {
            tracing::debug!(duplicate = %id, "tool call id collision; regenerating");
            id = generate_tool_call_id();
        }
        seen.insert(id.clone());

        let r#type = match raw.r#type.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => "function".to_string(),
        };

        let (name, arguments) = match &raw.function {
            Some(function) => (
                match &function.name {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                },
                match &function.arguments {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
                },
            ),
            None => (String::new(), String::new()),
        };

        normalized.push(ToolCallResponse {
            id,
            r#type,
            function: FunctionCallResponse { name, arguments },
        });
    }

    normalized
}

// ─── Argument Parsing ────────────────────────────────────────────────────────

/// Parse the argument string of a tool call.
///
/// Empty or whitespace-only input yields `{}`. When `debug` is set, raw and
/// repaired parse failures are logged with the offending text.
pub fn parse_tool_arguments(
    tool_name: &str,
    raw: &str,
    debug: bool,
) -> Result<serde_json::Value, InferenceError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    let first_err = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    log_parse_failure(debug, "raw", tool_name, raw, &first_err);

    let repaired = repair_json_string(raw);
    if repaired == raw {
        return Err(InferenceError::ToolCallParseError {
            tool: tool_name.to_string(),
            raw_response: raw.to_string(),
            repaired: None,
            reason: first_err.to_string(),
        });
    }

    match serde_json::from_str::<serde_json::Value>(&repaired) {
        Ok(value) => {
            tracing::info!(tool = %tool_name, "repaired malformed tool call arguments");
            Ok(value)
        }
        Err(second_err) => {
            log_parse_failure(debug, "repaired", tool_name, &repaired, &second_err);
            Err(InferenceError::ToolCallParseError {
                tool: tool_name.to_string(),
                raw_response: raw.to_string(),
                repaired: Some(repaired),
                reason: second_err.to_string(),
            })
        }
    }
}

fn log_parse_failure(
    debug: bool,
    stage: &str,
    tool_name: &str,
    text: &str,
    error: &serde_json::Error,
) {
    if !debug {
        return;
    }
    tracing::warn!(
        stage,
        tool = %tool_name,
        error = %error,
        args = %text,
        "tool argument parse failed"
    );
}

// ─── Tests ───────────────────────────────────────────────────────────────────
