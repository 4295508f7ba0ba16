//! Shared types for the provider boundary.
//!
//! These mirror the OpenAI Chat Completions API types. The session builds
//! `ChatMessage`s, providers return a `Completion` whose tool calls are raw
//! and untrusted until they pass through the normalizer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// Serialization notes for OpenAI-compatible backends:
/// - `content` is emitted as `""` (not `null`) for assistant messages with
///   tool calls. Several runtimes mishandle `null` content.
/// - `tool_call_id`, `tool_calls` and `reasoning_content` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool call results are sent back as `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
    /// Reasoning text replayed to providers that require it on assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl ChatMessage {
    /// Plain text message with no tool metadata.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
            reasoning_content: None,
        }
    }
}

/// Emit `""` instead of `null` when `content` is `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Build a `"function"` tool definition.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Callback receiving incremental text (answer tokens or reasoning tokens).
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call options handed to `Provider::complete`.
#[derive(Clone)]
pub struct ProviderOptions {
    /// Whether the provider should stream tokens through `on_token`.
    pub stream: bool,
    /// Definitions of the resolved toolset (empty when tools are disabled).
    pub tools: Vec<ToolDefinition>,
    pub on_token: Option<TokenCallback>,
    pub on_reasoning: Option<TokenCallback>,
    /// Abort signal; providers may use it to tear down in-flight requests.
    pub signal: Option<CancellationToken>,
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("stream", &self.stream)
            .field("tools", &self.tools.len())
            .field("on_token", &self.on_token.is_some())
            .field("on_reasoning", &self.on_reasoning.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A tool call exactly as the provider emitted it.
///
/// Every field is optional and loosely typed: ids may be numbers, arguments
/// may arrive as an object instead of a string. `normalize_tool_calls`
/// turns these into `ToolCallResponse`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub function: Option<RawFunctionCall>,
}

impl RawToolCall {
    /// Convenience constructor for a function call with string arguments.
    pub fn new(id: Option<&str>, name: &str, arguments: &str) -> Self {
        Self {
            id: id.map(|s| serde_json::Value::String(s.to_string())),
            r#type: None,
            function: Some(RawFunctionCall {
                name: Some(serde_json::Value::String(name.to_string())),
                arguments: Some(serde_json::Value::String(arguments.to_string())),
            }),
        }
    }
}

/// Function part of a raw tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    #[serde(default)]
    pub name: Option<serde_json::Value>,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// Normalized tool call, as persisted on assistant messages.
///
/// `id` is non-empty and unique within its batch, `type` defaults to
/// `"function"`, and `function.arguments` is always a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

/// Function call details in a normalized tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    /// Tool name. Empty means the model did not name a tool.
    pub name: String,
    /// JSON-encoded arguments, not guaranteed to be valid JSON.
    pub arguments: String,
}

/// Result of one provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<RawToolCall>,
    pub reasoning: Option<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
