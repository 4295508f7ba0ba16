//! Task-manager payload enrichment.
//!
//! Two rewrites applied to parsed tool arguments before dispatch, both keyed
//! on the tool name and both idempotent:
//!
//! - `ensure_task_add_payload` fills missing task titles for the task
//!   creation tool from the last user message.
//! - `attach_task_session_ids` tags task-manager payloads with the current
//!   run and session identifiers without overriding explicit values.
//!
//! Payloads that are not JSON objects pass through untouched (`null` is
//! treated as an empty object).

use serde_json::{Map, Value};

use super::conversation::Session;

/// Substring identifying task-manager tools.
const TASK_MANAGER_MARKER: &str = "task_manager";
/// Substring identifying the task creation tool.
const TASK_ADD_TOOL: &str = "task_manager_add_task";

const ADD_ACTION: &str = "add_task";

/// Fallback titles longer than this are cut with an ellipsis.
const MAX_FALLBACK_TITLE_CHARS: usize = 120;
const DEFAULT_TASK_TITLE: &str = "New task";

// ─── Title fallback ─────────────────────────────────────────────────────────

/// Make sure a task creation payload carries titles.
///
/// Falsy entries of `tasks` are dropped and the field is removed when
/// nothing is left. Entries without a non-blank title get one derived from
/// the last user message. Without `tasks`, a missing top-level `title` is
/// filled the same way.
pub fn ensure_task_add_payload(tool: &str, args: Value, session: &dyn Session) -> Value {
    if !tool.contains(TASK_ADD_TOOL) {
        return args;
    }
    let mut payload = into_payload(args);
    let Some(payload_map) = payload.as_object_mut() else {
        return payload;
    };

    if let Some(Value::Array(tasks)) = payload_map.get("tasks") {
        let kept: Vec<Value> = tasks.iter().filter(|t| is_truthy(t)).cloned().collect();
        if kept.is_empty() {
            payload_map.remove("tasks");
        } else {
            let fallback = build_fallback_task_title(session);
            let tasks = kept
                .into_iter()
                .map(|task| with_title(task, &fallback))
                .collect();
            payload_map.insert("tasks".to_string(), Value::Array(tasks));
            return payload;
        }
    }

    if !payload_map.get("title").is_some_and(is_truthy) {
        payload_map.insert(
            "title".to_string(),
            Value::String(build_fallback_task_title(session)),
        );
    }
    payload
}

/// Title derived from the last user message, or `"New task"`.
pub fn build_fallback_task_title(session: &dyn Session) -> String {
    let raw = session.last_user_message().unwrap_or_default();
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return DEFAULT_TASK_TITLE.to_string();
    }
    if normalized.chars().count() > MAX_FALLBACK_TITLE_CHARS {
        let head: String = normalized.chars().take(MAX_FALLBACK_TITLE_CHARS - 3).collect();
        return format!("{head}...");
    }
    normalized
}

fn with_title(task: Value, fallback: &str) -> Value {
    match task {
        Value::Object(mut map) => {
            if !map.get("title").is_some_and(title_is_present) {
                map.insert("title".to_string(), Value::String(fallback.to_string()));
            }
            Value::Object(map)
        }
        _ => {
            let mut map = Map::new();
            map.insert("title".to_string(), Value::String(fallback.to_string()));
            Value::Object(map)
        }
    }
}

fn title_is_present(title: &Value) -> bool {
    match title {
        Value::String(s) => !s.trim().is_empty(),
        other => is_truthy(other),
    }
}

// ─── Session / run tagging ──────────────────────────────────────────────────

/// Attach run and session identifiers to a task-manager payload.
///
/// The run id goes onto every entry of a non-empty `tasks` array, or onto
/// the payload itself. The session id goes onto every task for the add
/// action; for every other action it is set on the payload unless the
/// payload already names a session or asks for `allSessions`.
pub fn attach_task_session_ids(
    tool: &str,
    args: Value,
    session_id: Option<&str>,
    run_id: Option<&str>,
) -> Value {
    if !tool.contains(TASK_MANAGER_MARKER) {
        return args;
    }
    let mut payload = into_payload(args);
    let Some(payload_map) = payload.as_object_mut() else {
        return payload;
    };
    let action = tool
        .split_once("task_manager_")
        .map(|(_, action)| action)
        .unwrap_or("");

    if let Some(run_id) = run_id.map(str::trim).filter(|r| !r.is_empty()) {
        if !tag_tasks(payload_map, "runId", run_id) {
            set_if_missing(payload_map, "runId", run_id);
        }
    }

    let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
        return payload;
    };

    if action == ADD_ACTION {
        if !tag_tasks(payload_map, "sessionId", session_id) {
            set_if_missing(payload_map, "sessionId", session_id);
        }
    } else {
        // Listing and every other action: explicit scope wins.
        let global = payload_map.get("allSessions").is_some_and(is_truthy);
        if !global {
            set_if_missing(payload_map, "sessionId", session_id);
        }
    }
    payload
}

/// Set `key` on every entry of a non-empty `tasks` array. Returns `false`
/// when there is no such array.
fn tag_tasks(payload: &mut Map<String, Value>, key: &str, value: &str) -> bool {
    let Some(Value::Array(tasks)) = payload.get_mut("tasks") else {
        return false;
    };
    if tasks.is_empty() {
        return false;
    }
    for task in tasks.iter_mut() {
        if !task.is_object() {
            *task = Value::Object(Map::new());
        }
        if let Some(map) = task.as_object_mut() {
            set_if_missing(map, key, value);
        }
    }
    true
}

fn set_if_missing(map: &mut Map<String, Value>, key: &str, value: &str) {
    if !map.get(key).is_some_and(is_truthy) {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// `null` becomes an empty object; everything else is kept as is.
fn into_payload(args: Value) -> Value {
    match args {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// JavaScript-style truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
