//! Shared types for the agent core.
//!
//! Run options, observer callbacks and the event payloads they receive.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::inference::types::{TokenCallback, ToolCallResponse};

use super::conversation::Session;
use super::environment::LoopEnvironment;

/// Default cap on tool-dispatch rounds per run.
pub const DEFAULT_MAX_TOOL_PASSES: usize = 240;

// ─── Observer Events ────────────────────────────────────────────────────────

/// An assistant turn that requested tools, emitted before dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantStep {
    pub text: String,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallResponse>,
    pub iteration: usize,
    pub model: String,
}

/// A tool about to be invoked with its final arguments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEvent {
    pub tool: String,
    pub call_id: String,
    pub args: serde_json::Value,
}

/// A tool result (or recorded error) for one call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultEvent {
    pub tool: String,
    pub call_id: String,
    pub result: String,
}

pub type AssistantStepCallback = Arc<dyn Fn(&AssistantStep) + Send + Sync>;
pub type ToolCallCallback = Arc<dyn Fn(&ToolCallEvent) + Send + Sync>;
pub type ToolResultCallback = Arc<dyn Fn(&ToolResultEvent) + Send + Sync>;

/// Invoke an observer, swallowing any panic it raises.
pub(crate) fn notify<T: ?Sized>(callback: Option<&Arc<dyn Fn(&T) + Send + Sync>>, event: &T, name: &str) {
    let Some(callback) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
        tracing::warn!(callback = name, "observer callback panicked; ignoring");
    }
}

// ─── Before-request hook ────────────────────────────────────────────────────

/// Maintenance work run before every provider call (e.g. compaction).
///
/// Runs at a safe boundary: no tool round is in progress, so the hook may
/// rewrite history. An error ends the run.
#[async_trait]
pub trait BeforeRequestHook: Send + Sync {
    async fn before_request(
        &self,
        iteration: usize,
        model: &str,
        session: &mut dyn Session,
    ) -> anyhow::Result<()>;
}

// ─── Run Options ────────────────────────────────────────────────────────────

/// Options for one `AgentClient::run` call.
#[derive(Clone)]
pub struct RunOptions {
    pub stream: bool,
    pub on_token: Option<TokenCallback>,
    pub on_reasoning: Option<TokenCallback>,
    pub on_before_request: Option<Arc<dyn BeforeRequestHook>>,
    pub on_assistant_step: Option<AssistantStepCallback>,
    pub on_tool_call: Option<ToolCallCallback>,
    pub on_tool_result: Option<ToolResultCallback>,
    pub signal: Option<CancellationToken>,
    pub max_tool_passes: usize,
    pub disable_tools: bool,
    /// Tool names replacing the model's configured list (ignored when empty).
    pub tools_override: Option<Vec<String>>,
    /// Identifies the caller to tool handlers.
    pub caller: Option<String>,
    /// Explicit environment; `None` reads the process environment per run.
    pub environment: Option<LoopEnvironment>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stream: true,
            on_token: None,
            on_reasoning: None,
            on_before_request: None,
            on_assistant_step: None,
            on_tool_call: None,
            on_tool_result: None,
            signal: None,
            max_tool_passes: DEFAULT_MAX_TOOL_PASSES,
            disable_tools: false,
            tools_override: None,
            caller: None,
            environment: None,
        }
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("stream", &self.stream)
            .field("max_tool_passes", &self.max_tool_passes)
            .field("disable_tools", &self.disable_tools)
            .field("tools_override", &self.tools_override)
            .field("caller", &self.caller)
            .field("signal", &self.signal.is_some())
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
