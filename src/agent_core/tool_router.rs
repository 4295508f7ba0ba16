//! Tool registry and per-call dispatch.
//!
//! A tool is a name, a definition advertised to the model, and an async
//! handler. The registry resolves the toolset for a run; `ToolDispatcher`
//! runs one model tool call through its full lifecycle:
//! resolve → parse arguments → enrich → notify → invoke → sanitize → record.
//!
//! Every failure except abort is recorded in the session as an `[error]`
//! tool result so the model can react to it, and the round continues.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::inference::tool_call_parser::parse_tool_arguments;
use crate::inference::types::{ToolCallResponse, ToolDefinition};

use super::cancellation::race_with_abort;
use super::conversation::Session;
use super::enrichment::{attach_task_session_ids, ensure_task_add_payload};
use super::environment::LoopEnvironment;
use super::errors::{AgentError, ToolError};
use super::tool_result::{format_tool_result, sanitize_tool_result};
use super::types::{notify, ToolCallCallback, ToolCallEvent, ToolResultCallback, ToolResultEvent};

// ─── Handler Contract ───────────────────────────────────────────────────────

/// What a handler gets to know about the call it is serving.
pub struct ToolContext<'a> {
    pub model: &'a str,
    /// Read-only view of the conversation.
    pub session: &'a dyn Session,
    /// Fires when the run is aborted; long-running handlers should watch it.
    pub signal: CancellationToken,
    pub tool_call_id: &'a str,
    pub caller: Option<&'a str>,
}

/// An executable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value, ctx: ToolContext<'_>) -> Result<Value, ToolError>;
}

/// Handler built from a closure. See [`tool_fn`].
pub struct FnTool<F>(F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: for<'a> Fn(Value, ToolContext<'a>) -> BoxFuture<'static, Result<Value, ToolError>>
        + Send
        + Sync,
{
    async fn call(&self, args: Value, ctx: ToolContext<'_>) -> Result<Value, ToolError> {
        (self.0)(args, ctx).await
    }
}

/// Wrap a closure as a handler.
///
/// The closure reads what it needs from the context synchronously and
/// returns a boxed `'static` future.
pub fn tool_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: for<'a> Fn(Value, ToolContext<'a>) -> BoxFuture<'static, Result<Value, ToolError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnTool(f))
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// A tool available to the loop.
#[derive(Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        let name = name.into();
        Self {
            definition: ToolDefinition::function(&name, description, parameters),
            name,
            handler,
        }
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// All tools known to the client, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: RegisteredTool) {
        if self.tools.insert(tool.name.clone(), tool).is_some() {
            tracing::debug!("tool re-registered; previous handler replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools for `names`, in the given order. Unknown and duplicate names
    /// are skipped.
    pub fn resolve_toolset(&self, names: &[String]) -> Vec<RegisteredTool> {
        let mut seen = std::collections::HashSet::new();
        let mut toolset = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if !seen.insert(name.to_string()) {
                continue;
            }
            match self.tools.get(name) {
                Some(tool) => toolset.push(tool.clone()),
                None => tracing::warn!(tool = %name, "configured tool is not registered; skipping"),
            }
        }
        toolset
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────────────

/// Per-round dispatch settings.
pub struct ToolDispatcher<'a> {
    pub model: &'a str,
    pub signal: &'a CancellationToken,
    pub caller: Option<&'a str>,
    pub environment: &'a LoopEnvironment,
    pub on_tool_call: Option<&'a ToolCallCallback>,
    pub on_tool_result: Option<&'a ToolResultCallback>,
}

impl ToolDispatcher<'_> {
    /// Run one tool call and record its outcome in `session`.
    ///
    /// Only an abort is returned as an error; every other failure becomes
    /// an `[error]` tool result.
    pub async fn dispatch(
        &self,
        call: &ToolCallResponse,
        toolset: &[RegisteredTool],
        session: &mut dyn Session,
    ) -> Result<(), AgentError> {
        let name = call.function.name.as_str();

        let Some(tool) = toolset.iter().find(|t| t.name == name) else {
            tracing::warn!(tool = %name, call_id = %call.id, "model requested unregistered tool");
            let message =
                format!("[error] Tool \"{name}\" is not registered but was requested by the model");
            self.record_error(call, session, message);
            return Ok(());
        };

        let parsed = match parse_tool_arguments(
            name,
            &call.function.arguments,
            self.environment.debug_tool_args,
        ) {
            Ok(args) => args,
            Err(e) => {
                self.record_error(call, session, format!("[error] Failed to parse tool arguments: {e}"));
                return Ok(());
            }
        };

        let hydrated = ensure_task_add_payload(name, parsed, &*session);
        let final_args = attach_task_session_ids(
            name,
            hydrated,
            session.session_id(),
            self.environment.run_id.as_deref(),
        );

        notify(
            self.on_tool_call,
            &ToolCallEvent {
                tool: name.to_string(),
                call_id: call.id.clone(),
                args: final_args.clone(),
            },
            "on_tool_call",
        );

        tracing::info!(tool = %name, call_id = %call.id, "dispatching tool call");

        let outcome = {
            let ctx = ToolContext {
                model: self.model,
                session: &*session,
                signal: self.signal.clone(),
                tool_call_id: &call.id,
                caller: self.caller,
            };
            race_with_abort(tool.handler.call(final_args, ctx), Some(self.signal)).await?
        };

        match outcome {
            Ok(value) => {
                let formatted = format_tool_result(&value);
                let sanitized = sanitize_tool_result(
                    &formatted,
                    Some(name),
                    self.environment.tool_result_char_limit,
                );
                session.add_tool_result(&call.id, &sanitized);
                self.emit_result(call, formatted);
                Ok(())
            }
            Err(ToolError::Aborted) => Err(AgentError::Aborted),
            Err(_) if self.signal.is_cancelled() => Err(AgentError::Aborted),
            Err(ToolError::Failed(e)) => {
                tracing::warn!(tool = %name, call_id = %call.id, error = %e, "tool handler failed");
                self.record_error(call, session, format!("[error] Tool \"{name}\" failed: {e}"));
                Ok(())
            }
        }
    }

    fn record_error(&self, call: &ToolCallResponse, session: &mut dyn Session, message: String) {
        session.add_tool_result(&call.id, &message);
        self.emit_result(call, message);
    }

    fn emit_result(&self, call: &ToolCallResponse, result: String) {
        notify(
            self.on_tool_result,
            &ToolResultEvent {
                tool: match call.function.name.as_str() {
                    "" => "unknown".to_string(),
                    name => name.to_string(),
                },
                call_id: call.id.clone(),
                result,
            },
            "on_tool_result",
        );
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
