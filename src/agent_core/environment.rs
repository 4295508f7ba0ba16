//! Environment-derived knobs for a run.
//!
//! Collected into one explicit struct instead of being read ad hoc. The loop
//! calls [`LoopEnvironment::from_env`] once at the start of every run unless
//! the caller supplies a value, so changes take effect on the next run.

/// Gates logging of raw/repaired argument parse failures.
pub const DEBUG_TOOL_ARGS_ENV: &str = "MODEL_CLI_DEBUG_TOOL_ARGS";
/// Run identifier attached to task-manager payloads.
pub const RUN_ID_ENV: &str = "MODEL_CLI_RUN_ID";
/// Character limit for tool results persisted into the session.
pub const MAX_TOOL_RESULT_CHARS_ENV: &str = "MODEL_CLI_MAX_TOOL_RESULT_CHARS";
/// Logs a preview of every provider request at debug level.
pub const LOG_REQUEST_ENV: &str = "MODEL_CLI_LOG_REQUEST";

/// Default tool result limit (characters).
pub const DEFAULT_TOOL_RESULT_CHAR_LIMIT: usize = 120_000;

/// Per-run configuration normally sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopEnvironment {
    pub debug_tool_args: bool,
    pub run_id: Option<String>,
    /// `0` disables truncation.
    pub tool_result_char_limit: usize,
    pub log_requests: bool,
}

impl Default for LoopEnvironment {
    fn default() -> Self {
        Self {
            debug_tool_args: false,
            run_id: None,
            tool_result_char_limit: DEFAULT_TOOL_RESULT_CHAR_LIMIT,
            log_requests: false,
        }
    }
}

impl LoopEnvironment {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let run_id = lookup(RUN_ID_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self {
            debug_tool_args: lookup(DEBUG_TOOL_ARGS_ENV).as_deref() == Some("1"),
            run_id,
            tool_result_char_limit: parse_char_limit(lookup(MAX_TOOL_RESULT_CHARS_ENV).as_deref()),
            log_requests: lookup(LOG_REQUEST_ENV).as_deref() == Some("1"),
        }
    }
}

/// Parse the result limit override.
///
/// Unset or blank keeps the default. `0`, `off`, `false`, negative or
/// unparseable values disable truncation.
fn parse_char_limit(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return DEFAULT_TOOL_RESULT_CHAR_LIMIT;
    };
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return DEFAULT_TOOL_RESULT_CHAR_LIMIT;
    }
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.floor() as usize,
        _ => 0,
    }
}
