//! Context compaction as a before-request hook.
//!
//! When the estimated history size passes a token budget, older turns are
//! folded into a single system note made of one-line summaries. Leading
//! system messages and the most recent turns stay verbatim, and the cut is
//! moved back to a user message so an assistant tool round is never split
//! from its results.

use async_trait::async_trait;

use crate::inference::types::{ChatMessage, Role};

use super::conversation::Session;
use super::tokens::{estimate_history_tokens, estimate_tokens, summarize_turn, CHARS_PER_TOKEN};
use super::types::BeforeRequestHook;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Default history budget before compaction kicks in.
pub const DEFAULT_COMPACTION_BUDGET_TOKENS: u32 = 24_000;

/// Default number of most recent messages kept verbatim.
pub const DEFAULT_KEEP_RECENT: usize = 10;

/// Cap on the summary note; older lines are dropped first.
const MAX_SUMMARY_TOKENS: u32 = 500;

const SUMMARY_HEADER: &str = "## Previous conversation summary:";

// ─── ContextCompactor ───────────────────────────────────────────────────────

/// Folds old history into a summary note once it outgrows `max_tokens`.
#[derive(Debug, Clone)]
pub struct ContextCompactor {
    pub max_tokens: u32,
    pub keep_recent: usize,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_COMPACTION_BUDGET_TOKENS,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}

impl ContextCompactor {
    pub fn new(max_tokens: u32, keep_recent: usize) -> Self {
        Self {
            max_tokens,
            keep_recent,
        }
    }

    /// Compact `session` if it is over budget. Returns the number of
    /// messages folded into the summary.
    pub fn compact_if_needed(&self, session: &mut dyn Session) -> usize {
        let messages = session.as_dicts();
        let total = estimate_history_tokens(&messages);
        if total <= self.max_tokens {
            return 0;
        }

        let Some(range) = self.compaction_range(&messages) else {
            tracing::debug!(total_tokens = total, "history over budget but nothing to compact");
            return 0;
        };

        let folded = range.len();
        let summary = build_summary(&messages[range.clone()]);
        if !session.compact(range, &summary) {
            tracing::debug!("session does not support compaction");
            return 0;
        }

        tracing::info!(
            folded,
            total_tokens = total,
            budget = self.max_tokens,
            "compacted conversation history"
        );
        folded
    }

    /// Messages to fold: everything after the leading system messages up to
    /// the start of the kept tail, cut at a user message.
    fn compaction_range(&self, messages: &[ChatMessage]) -> Option<std::ops::Range<usize>> {
        let start = messages.iter().take_while(|m| m.role == Role::System).count();
        if messages.len() <= start + self.keep_recent {
            return None;
        }

        let mut cut = messages.len() - self.keep_recent;
        while cut > start && messages.get(cut).map(|m| &m.role) != Some(&Role::User) {
            cut -= 1;
        }
        (cut > start).then_some(start..cut)
    }
}

#[async_trait]
impl BeforeRequestHook for ContextCompactor {
    async fn before_request(
        &self,
        iteration: usize,
        model: &str,
        session: &mut dyn Session,
    ) -> anyhow::Result<()> {
        let folded = self.compact_if_needed(session);
        if folded > 0 {
            tracing::debug!(iteration, model = %model, folded, "compaction ran before request");
        }
        Ok(())
    }
}

// ─── Summary ────────────────────────────────────────────────────────────────

fn build_summary(messages: &[ChatMessage]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(messages.len());
    let mut files: Vec<String> = Vec::new();

    for msg in messages {
        lines.push(summarize_turn(&msg.role, msg.content.as_deref()));

        for call in msg.tool_calls.iter().flatten() {
            let path = serde_json::from_str::<serde_json::Value>(&call.function.arguments)
                .ok()
                .and_then(|args| args.get("path").and_then(|v| v.as_str()).map(str::to_string));
            if let Some(path) = path {
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }
    }

    let mut body = lines.join("\n");
    if estimate_tokens(&body) > MAX_SUMMARY_TOKENS {
        let target_chars = (MAX_SUMMARY_TOKENS as f64 * CHARS_PER_TOKEN) as usize;
        let total_chars = body.chars().count();
        let kept: String = body.chars().skip(total_chars.saturating_sub(target_chars)).collect();
        body = format!("[earlier context omitted]\n{kept}");
    }

    if files.is_empty() {
        format!("{SUMMARY_HEADER}\n{body}")
    } else {
        format!("{SUMMARY_HEADER}\n{body}\nFiles touched: {}", files.join(", "))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
