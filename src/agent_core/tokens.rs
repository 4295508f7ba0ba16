//! Token estimation for context compaction.
//!
//! No tokenizer is available at this layer, so sizes are estimated from
//! character counts: ~3.2 chars/token for prose and ~2.8 for JSON, which is
//! denser in punctuation. Estimates err on the high side.

use crate::inference::types::{ChatMessage, Role};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Characters per token for prose.
pub(crate) const CHARS_PER_TOKEN: f64 = 3.2;

/// Characters per token for JSON (tool arguments and tool results).
const JSON_CHARS_PER_TOKEN: f64 = 2.8;

/// Role label and framing per message.
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Id, type and framing per tool call.
const TOOL_CALL_OVERHEAD_TOKENS: u32 = 10;

/// Summary line budgets, in characters.
const SUMMARY_TEXT_CHARS: usize = 80;
const SUMMARY_RESULT_CHARS: usize = 60;

// ─── Truncation ─────────────────────────────────────────────────────────────

/// Cut `s` to at most `max_bytes` bytes without splitting a character.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = (0..=max_bytes).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}

fn head_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

// ─── Estimation ─────────────────────────────────────────────────────────────

fn tokens_for(text: &str, chars_per_token: f64) -> u32 {
    (text.chars().count() as f64 / chars_per_token).ceil() as u32
}

/// Estimated tokens for prose.
pub fn estimate_tokens(text: &str) -> u32 {
    tokens_for(text, CHARS_PER_TOKEN)
}

/// Estimated tokens for JSON text.
pub fn estimate_json_tokens(json_text: &str) -> u32 {
    tokens_for(json_text, JSON_CHARS_PER_TOKEN)
}

/// Estimated tokens for one message, including tool calls and reasoning.
pub fn estimate_message_tokens(message: &ChatMessage) -> u32 {
    let content = message.content.as_deref().map_or(0, |text| match message.role {
        Role::Tool => estimate_json_tokens(text),
        _ => estimate_tokens(text),
    });
    let reasoning = message.reasoning_content.as_deref().map_or(0, estimate_tokens);
    let call_id = message.tool_call_id.as_deref().map_or(0, estimate_tokens);
    let calls: u32 = message
        .tool_calls
        .iter()
        .flatten()
        .map(|call| {
            TOOL_CALL_OVERHEAD_TOKENS
                + estimate_tokens(&call.function.name)
                + estimate_json_tokens(&call.function.arguments)
        })
        .sum();

    MESSAGE_OVERHEAD_TOKENS + content + reasoning + call_id + calls
}

/// Estimated tokens for a whole history.
pub fn estimate_history_tokens(messages: &[ChatMessage]) -> u32 {
    messages.iter().map(estimate_message_tokens).sum()
}

/// One-line description of a message for a compaction summary.
pub fn summarize_turn(role: &Role, content: Option<&str>) -> String {
    let content = content.filter(|text| !text.is_empty());
    match role {
        Role::User => format!(
            "User: {}",
            head_chars(content.unwrap_or("[empty]"), SUMMARY_TEXT_CHARS)
        ),
        Role::Assistant => format!(
            "Assistant: {}",
            head_chars(content.unwrap_or("[tool calls]"), SUMMARY_TEXT_CHARS)
        ),
        Role::Tool => format!(
            "Tool result: {}",
            head_chars(content.unwrap_or("[result]"), SUMMARY_RESULT_CHARS)
        ),
        Role::System => "System note".to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
