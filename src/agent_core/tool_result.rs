//! Tool result formatting and sanitization.
//!
//! Tool output is replayed to the model as plain text on every later turn,
//! so before it is persisted into the session it is stripped of terminal
//! escape sequences and control bytes and bounded in size. Observers still
//! see the unsanitized text.

use std::sync::OnceLock;

use regex::Regex;

use super::environment::MAX_TOOL_RESULT_CHARS_ENV;

/// Share of the kept budget given to the head of a truncated result.
const HEAD_RATIO: f64 = 0.7;

// ─── Formatting ─────────────────────────────────────────────────────────────

/// Render a handler's return value as text.
///
/// Strings pass through, `null` becomes empty, scalars use their JSON
/// spelling and structures are pretty-printed.
pub fn format_tool_result(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => result.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

// ─── Stripping ──────────────────────────────────────────────────────────────

fn csi_pattern() -> Option<&'static Regex> {
    static CSI: OnceLock<Option<Regex>> = OnceLock::new();
    CSI.get_or_init(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").ok()).as_ref()
}

fn osc_pattern() -> Option<&'static Regex> {
    static OSC: OnceLock<Option<Regex>> = OnceLock::new();
    OSC.get_or_init(|| Regex::new(r"\x1b\][^\x07]*(?:\x07|\x1b\\)").ok()).as_ref()
}

/// Remove ANSI CSI and OSC escape sequences.
pub fn strip_ansi(input: &str) -> String {
    let mut text = input.to_string();
    if let Some(re) = csi_pattern() {
        text = re.replace_all(&text, "").into_owned();
    }
    if let Some(re) = osc_pattern() {
        text = re.replace_all(&text, "").into_owned();
    }
    text
}

/// Drop ASCII control characters except newline, carriage return and tab.
pub fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            let code = c as u32;
            !(code <= 0x1f || code == 0x7f) || matches!(c, '\n' | '\r' | '\t')
        })
        .collect()
}

// ─── Sanitization ───────────────────────────────────────────────────────────

/// Make tool output safe and bounded for the session.
///
/// `limit` is in characters; `0` disables truncation. Over the limit, the
/// head (~70%) and tail of the kept budget survive around a marker naming
/// the tool and the override knob, and the whole result fits in `limit`.
pub fn sanitize_tool_result(text: &str, tool: Option<&str>, limit: usize) -> String {
    let normalized = strip_control_chars(&strip_ansi(text));
    truncate_head_tail(&normalized, tool, limit)
}

fn truncation_marker(omitted: usize, label: &str) -> String {
    format!(
        "\n\n... (truncated {omitted} chars from {label} output; \
         set {MAX_TOOL_RESULT_CHARS_ENV} to increase) ...\n\n"
    )
}

fn truncate_head_tail(text: &str, tool: Option<&str>, limit: usize) -> String {
    let total = text.chars().count();
    if limit == 0 || total <= limit {
        return text.to_string();
    }

    let label = tool.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("tool");

    // The marker's length depends on the omitted count, which depends on
    // the marker's length. `omitted` only grows, so this settles quickly.
    let mut omitted = total - limit;
    let mut marker = truncation_marker(omitted, label);
    loop {
        let budget = limit.saturating_sub(marker.chars().count());
        let next = total - budget;
        if next == omitted {
            break;
        }
        omitted = next;
        marker = truncation_marker(omitted, label);
    }

    let marker_len = marker.chars().count();
    if marker_len >= limit {
        // No room for a marker: hard cut.
        return text.chars().take(limit).collect();
    }

    let budget = limit - marker_len;
    let head_len = (budget as f64 * HEAD_RATIO).floor() as usize;
    let tail_len = budget - head_len;

    tracing::warn!(
        tool = %label,
        original_len = total,
        truncated_to = limit,
        "tool result truncated"
    );

    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(total - tail_len).collect();
    format!("{head}{marker}{tail}")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_scalars_and_null() {
        assert_eq!(format_tool_result(&json!("plain")), "plain");
        assert_eq!(format_tool_result(&json!(null)), "");
        assert_eq!(format_tool_result(&json!(42)), "42");
        assert_eq!(format_tool_result(&json!(1.5)), "1.5");
        assert_eq!(format_tool_result(&json!(true)), "true");
    }

    #[test]
    fn test_format_structures_round_trip() {
        for value in [
            json!({"a": 1, "nested": {"b": [1, 2, 3]}}),
            json!([1, "two", null, {"three": 3}]),
        ] {
            let text = sanitize_tool_result(&format_tool_result(&value), Some("t"), 0);
            assert!(text.contains('\n'), "structures are pretty-printed");
            let back: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_strip_ansi_csi_and_osc() {
        let input = "\x1b[31mred\x1b[0m plain \x1b]0;title\x07after \x1b]8;;http://x\x1b\\link";
        assert_eq!(strip_ansi(input), "red plain after link");
    }

    #[test]
    fn test_strip_control_chars_keeps_whitespace() {
        let input = "a\u{0000}b\u{0008}c\td\ne\rf\u{007f}g\u{001b}";
        assert_eq!(strip_control_chars(input), "abc\td\ne\rfg");
    }

    #[test]
    fn test_short_result_unchanged_except_stripping() {
        let text = "\x1b[1mok\x1b[0m\u{0007}";
        assert_eq!(sanitize_tool_result(text, Some("shell"), 100), "ok");
        assert_eq!(sanitize_tool_result("exact", Some("shell"), 5), "exact");
    }

    #[test]
    fn test_limit_zero_disables_truncation() {
        let text = "x".repeat(200_000);
        assert_eq!(sanitize_tool_result(&text, Some("shell"), 0).len(), 200_000);
    }

    #[test]
    fn test_truncation_keeps_head_and_tail_within_limit() {
        let text: String = (0..5_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let limit = 1_000;
        let out = sanitize_tool_result(&text, Some("shell"), limit);

        assert!(out.chars().count() <= limit, "len {}", out.chars().count());
        assert!(out.contains("from shell output"));
        assert!(out.contains(MAX_TOOL_RESULT_CHARS_ENV));

        let marker_start = out.find("\n\n... (truncated ").unwrap();
        let head = &out[..marker_start];
        let tail = &out[out.rfind(") ...\n\n").unwrap() + ") ...\n\n".len()..];
        assert!(text.starts_with(head));
        assert!(text.ends_with(tail));
        assert!(head.len() > tail.len(), "head gets the larger share");

        let omitted: usize = out[marker_start..]
            .split_whitespace()
            .nth(2)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(omitted, text.len() - head.len() - tail.len());
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "é".repeat(3_000);
        let out = sanitize_tool_result(&text, Some("cat"), 500);
        assert!(out.chars().count() <= 500);
        assert!(out.starts_with('é'));
        assert!(out.ends_with('é'));
    }

    #[test]
    fn test_blank_tool_name_uses_generic_label() {
        let out = sanitize_tool_result(&"z".repeat(2_000), Some("  "), 300);
        assert!(out.contains("from tool output"));
    }

    #[test]
    fn test_tiny_limit_hard_cuts() {
        let out = sanitize_tool_result(&"q".repeat(100), Some("shell"), 10);
        assert_eq!(out, "q".repeat(10));
    }
}
