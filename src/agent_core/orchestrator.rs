//! Agent loop: model call → tool execution → model call, until the model
//! answers without tools.
//!
//! One `run` drives a single chat turn for one session:
//! 1. **Request**: run the before-request hook, then send the full session
//!    history to the provider (never a cached payload).
//! 2. **Answer**: no tool calls: record the assistant message and return
//!    its trimmed text.
//! 3. **Round**: tool calls: checkpoint the session, record the assistant
//!    turn, dispatch every call in model order, then loop.
//!
//! Every await is raced against the abort signal. An abort during a round
//! restores the checkpoint so the history never holds a partial round.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::agent_core::tokens::truncate_utf8;
use crate::inference::config::{resolve_model, ModelConfig, ModelsConfig};
use crate::inference::provider::{Provider, ProviderFactory};
use crate::inference::tool_call_parser::normalize_tool_calls;
use crate::inference::types::{ChatMessage, ProviderOptions};

use super::cancellation::{race_with_abort, throw_if_aborted};
use super::conversation::{AssistantMetadata, Checkpoint, Session};
use super::environment::LoopEnvironment;
use super::errors::AgentError;
use super::tool_router::{RegisteredTool, ToolDispatcher, ToolRegistry};
use super::types::{notify, AssistantStep, RunOptions};

/// Bytes of serialized history shown in a request preview.
const REQUEST_PREVIEW_BYTES: usize = 2_000;

// ─── AgentClient ────────────────────────────────────────────────────────────

/// Model client: model registry, tools, and one provider per model.
pub struct AgentClient {
    config: ModelsConfig,
    registry: ToolRegistry,
    factory: Arc<dyn ProviderFactory>,
    /// Providers built so far, keyed by model name.
    providers: Mutex<HashMap<String, Arc<dyn Provider>>>,
}

impl AgentClient {
    pub fn new(config: ModelsConfig, registry: ToolRegistry, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            config,
            registry,
            factory,
            providers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ModelsConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Configured model names, sorted.
    pub fn model_names(&self) -> Vec<String> {
        self.config.model_names()
    }

    /// The model used when `run` gets no name.
    pub fn default_model(&self) -> Option<String> {
        resolve_model(&self.config, None).ok().map(|m| m.name)
    }

    fn provider_for(&self, settings: &ModelConfig) -> Result<Arc<dyn Provider>, AgentError> {
        let mut cache = self.providers.lock().map_err(|e| AgentError::ProviderCache {
            reason: e.to_string(),
        })?;
        if let Some(provider) = cache.get(&settings.name) {
            return Ok(Arc::clone(provider));
        }
        let provider = self.factory.create(settings)?;
        tracing::debug!(model = %settings.name, provider = %settings.provider, "provider created");
        cache.insert(settings.name.clone(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Tools for this run: none when disabled, else the override list when
    /// non-empty, else the model's configured list.
    fn resolve_toolset(&self, settings: &ModelConfig, options: &RunOptions) -> Vec<RegisteredTool> {
        if options.disable_tools {
            return Vec::new();
        }
        let names = match options.tools_override.as_deref() {
            Some(names) if !names.is_empty() => names,
            _ => settings.tools.as_slice(),
        };
        self.registry.resolve_toolset(names)
    }

    // ─── Run ────────────────────────────────────────────────────────────

    /// Drive one chat turn to completion and return the final answer.
    ///
    /// `model` of `None` uses the active model. Errors: abort (after
    /// rollback), the pass limit, hook failures and provider failures.
    pub async fn run(
        &self,
        model: Option<&str>,
        session: &mut dyn Session,
        options: RunOptions,
    ) -> Result<String, AgentError> {
        let settings = resolve_model(&self.config, model)?;
        let provider = self.provider_for(&settings)?;
        let model_name = settings.name.as_str();

        let environment = options.environment.clone().unwrap_or_else(LoopEnvironment::from_env);
        let signal = options.signal.clone().unwrap_or_default();
        let caller = options.caller.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let supports_reasoning = provider.supports_reasoning_content() || settings.supports_reasoning;

        let toolset = self.resolve_toolset(&settings, &options);
        let provider_options = ProviderOptions {
            stream: options.stream,
            tools: toolset.iter().map(|t| t.definition.clone()).collect(),
            on_token: options.on_token.clone(),
            on_reasoning: options.on_reasoning.clone(),
            signal: Some(signal.clone()),
        };
        let dispatcher = ToolDispatcher {
            model: model_name,
            signal: &signal,
            caller,
            environment: &environment,
            on_tool_call: options.on_tool_call.as_ref(),
            on_tool_result: options.on_tool_result.as_ref(),
        };

        tracing::info!(
            model = %model_name,
            tools = toolset.len(),
            max_tool_passes = options.max_tool_passes,
            "agent loop: run started"
        );

        let mut iteration = 0usize;
        while iteration < options.max_tool_passes {
            throw_if_aborted(Some(&signal))?;

            if let Some(hook) = options.on_before_request.as_ref() {
                race_with_abort(hook.before_request(iteration, model_name, &mut *session), Some(&signal))
                    .await?
                    .map_err(|e| AgentError::BeforeRequest { reason: e.to_string() })?;
                throw_if_aborted(Some(&signal))?;
            }

            let messages = session.as_dicts();
            if environment.log_requests {
                log_request_preview(model_name, iteration, &messages);
            }

            let completion =
                race_with_abort(provider.complete(messages, &provider_options), Some(&signal)).await??;

            let final_text = completion.content.as_deref().unwrap_or("").trim().to_string();
            let tool_calls = normalize_tool_calls(&completion.tool_calls);
            let metadata = reasoning_metadata(supports_reasoning, completion.reasoning.as_deref());

            if tool_calls.is_empty() || options.disable_tools {
                if !tool_calls.is_empty() {
                    tracing::debug!(
                        model = %model_name,
                        requested = tool_calls.len(),
                        "agent loop: tools disabled; ignoring requested tool calls"
                    );
                }
                session.add_assistant(&final_text, None, metadata);
                tracing::info!(model = %model_name, iteration, "agent loop: final answer");
                return Ok(final_text);
            }

            notify(
                options.on_assistant_step.as_ref(),
                &AssistantStep {
                    text: final_text.clone(),
                    reasoning: metadata.as_ref().map(|m| m.reasoning_content.clone()),
                    tool_calls: tool_calls.clone(),
                    iteration,
                    model: model_name.to_string(),
                },
                "on_assistant_step",
            );

            let checkpoint = session.checkpoint();
            session.add_assistant(&final_text, Some(tool_calls.clone()), metadata);

            tracing::info!(
                model = %model_name,
                iteration,
                tool_calls = tool_calls.len(),
                "agent loop: dispatching tool round"
            );

            for call in &tool_calls {
                let dispatched = dispatcher
                    .dispatch(call, &toolset, &mut *session)
                    .await
                    .and_then(|()| throw_if_aborted(Some(&signal)));
                if let Err(err) = dispatched {
                    rollback(session, checkpoint, &signal);
                    return Err(err);
                }
            }

            iteration += 1;
        }

        tracing::error!(
            model = %model_name,
            limit = options.max_tool_passes,
            "agent loop: too many consecutive tool calls"
        );
        Err(AgentError::TooManyToolPasses {
            limit: options.max_tool_passes,
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Metadata for the assistant turn.
///
/// Providers that require `reasoning_content` always get one (possibly
/// empty); otherwise it is attached only when the provider returned it.
fn reasoning_metadata(supports_reasoning: bool, reasoning: Option<&str>) -> Option<AssistantMetadata> {
    match reasoning {
        Some(text) => Some(AssistantMetadata {
            reasoning_content: text.to_string(),
        }),
        None if supports_reasoning => Some(AssistantMetadata {
            reasoning_content: String::new(),
        }),
        None => None,
    }
}

fn rollback(session: &mut dyn Session, checkpoint: Checkpoint, signal: &CancellationToken) {
    match session.restore(checkpoint) {
        Ok(()) => tracing::info!(
            aborted = signal.is_cancelled(),
            "agent loop: tool round interrupted; session restored to checkpoint"
        ),
        Err(e) => tracing::warn!(error = %e, "agent loop: checkpoint restore failed"),
    }
}

fn log_request_preview(model: &str, iteration: usize, messages: &[ChatMessage]) {
    let serialized = serde_json::to_string(messages).unwrap_or_default();
    tracing::debug!(
        model = %model,
        iteration,
        messages = messages.len(),
        preview = %truncate_utf8(&serialized, REQUEST_PREVIEW_BYTES),
        "agent loop: provider request"
    );
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::compaction::ContextCompactor;
    use crate::agent_core::conversation::ConversationManager;
    use crate::agent_core::errors::ToolError;
    use crate::agent_core::tool_router::tool_fn;
    use crate::agent_core::types::{
        BeforeRequestHook, ToolCallCallback, ToolCallEvent, ToolResultCallback, ToolResultEvent,
    };
    use crate::inference::errors::InferenceError;
    use crate::inference::types::{Completion, RawToolCall, Role};
    use async_trait::async_trait;
    use futures::FutureExt;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MODELS_YAML: &str = r#"
active_model: stub
models:
  stub:
    provider: scripted
    tools: [echo, boom, slow, task_manager_add_task]
  thinker:
    provider: scripted
    supports_reasoning: true
    tools: [echo]
"#;

    /// Provider whose reply for call `n` comes from a closure.
    struct ScriptedProvider {
        script: Box<dyn Fn(usize) -> Completion + Send + Sync>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: impl Fn(usize) -> Completion + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _options: &ProviderOptions,
        ) -> Result<Completion, InferenceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages);
            Ok((self.script)(n))
        }
    }

    fn answer(text: &str) -> Completion {
        Completion {
            content: Some(text.to_string()),
            ..Completion::default()
        }
    }

    fn tool_turn(calls: Vec<RawToolCall>) -> Completion {
        Completion {
            content: Some(String::new()),
            tool_calls: calls,
            reasoning: None,
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(RegisteredTool::new(
            "echo",
            "Echo arguments",
            json!({"type": "object"}),
            tool_fn(|args, _ctx| async move { Ok(args) }.boxed()),
        ));
        registry.register(RegisteredTool::new(
            "boom",
            "Always fails",
            json!({"type": "object"}),
            tool_fn(|_args, _ctx| async move { Err(ToolError::msg("disk full")) }.boxed()),
        ));
        registry.register(RegisteredTool::new(
            "slow",
            "Waits until aborted",
            json!({"type": "object"}),
            tool_fn(|_args, ctx| {
                let signal = ctx.signal.clone();
                async move {
                    tokio::select! {
                        _ = signal.cancelled() => Err(ToolError::Aborted),
                        _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(Value::Null),
                    }
                }
                .boxed()
            }),
        ));
        registry.register(RegisteredTool::new(
            "task_manager_add_task",
            "Add tasks",
            json!({"type": "object"}),
            tool_fn(|args, _ctx| async move { Ok(args) }.boxed()),
        ));
        registry
    }

    fn client(provider: Arc<ScriptedProvider>) -> AgentClient {
        let config = ModelsConfig::from_yaml(MODELS_YAML).unwrap();
        let factory = move |_settings: &ModelConfig| -> Result<Arc<dyn Provider>, InferenceError> {
            Ok(provider.clone() as Arc<dyn Provider>)
        };
        AgentClient::new(config, registry(), Arc::new(factory))
    }

    fn options() -> RunOptions {
        RunOptions {
            environment: Some(LoopEnvironment::default()),
            ..RunOptions::default()
        }
    }

    fn session() -> ConversationManager {
        let mut conv = ConversationManager::new();
        conv.add_user_message("hello");
        conv
    }

    fn tool_texts(session: &ConversationManager) -> Vec<String> {
        session
            .as_dicts()
            .into_iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_answer_without_tools_returns_trimmed_text() {
        let provider = ScriptedProvider::new(|_| answer("  all done \n"));
        let client = client(provider.clone());
        let mut conv = session();

        let text = client.run(None, &mut conv, options()).await.unwrap();
        assert_eq!(text, "all done");
        assert_eq!(provider.calls(), 1);
        let last = conv.as_dicts().pop().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content.as_deref(), Some("all done"));
        assert!(last.reasoning_content.is_none());
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![RawToolCall::new(Some("c1"), "echo", r#"{"x":1}"#)]),
            _ => answer("done"),
        });
        let client = client(provider.clone());
        let mut conv = session();

        assert_eq!(client.run(None, &mut conv, options()).await.unwrap(), "done");
        let dicts = conv.as_dicts();
        assert_eq!(dicts.len(), 4);
        assert_eq!(dicts[1].tool_calls.as_ref().unwrap()[0].id, "c1");
        assert_eq!(dicts[2].tool_call_id.as_deref(), Some("c1"));

        // The second request is built fresh from the session.
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[1].len(), 3);
    }

    #[tokio::test]
    async fn test_abort_during_second_tool_restores_checkpoint() {
        let provider = ScriptedProvider::new(|_| {
            tool_turn(vec![
                RawToolCall::new(Some("a"), "echo", r#"{"first":true}"#),
                RawToolCall::new(Some("b"), "slow", "{}"),
            ])
        });
        let client = client(provider);
        let mut conv = session();
        let before = conv.as_dicts();

        // Cancel shortly after the second handler starts waiting.
        let signal = CancellationToken::new();
        let trigger = signal.clone();
        let on_tool_call: ToolCallCallback = Arc::new(move |e: &ToolCallEvent| {
            if e.tool == "slow" {
                let trigger = trigger.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    trigger.cancel();
                });
            }
        });
        let results: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = results.clone();
        let on_tool_result: ToolResultCallback = Arc::new(move |e: &ToolResultEvent| {
            sink.lock().unwrap().push(e.call_id.clone());
        });

        let opts = RunOptions {
            signal: Some(signal),
            on_tool_call: Some(on_tool_call),
            on_tool_result: Some(on_tool_result),
            ..options()
        };
        let err = client.run(None, &mut conv, opts).await.unwrap_err();

        assert!(err.is_abort());
        assert_eq!(*results.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(conv.as_dicts(), before);
    }

    #[tokio::test]
    async fn test_abort_before_start_makes_no_provider_call() {
        let provider = ScriptedProvider::new(|_| answer("never"));
        let client = client(provider.clone());
        let mut conv = session();
        let signal = CancellationToken::new();
        signal.cancel();

        let opts = RunOptions {
            signal: Some(signal),
            ..options()
        };
        assert!(client.run(None, &mut conv, opts).await.unwrap_err().is_abort());
        assert_eq!(provider.calls(), 0);
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_max_tool_passes_counts_exact_provider_calls() {
        let provider = ScriptedProvider::new(|_| tool_turn(vec![RawToolCall::new(None, "echo", "{}")]));
        let client = client(provider.clone());
        let mut conv = session();

        let opts = RunOptions {
            max_tool_passes: 3,
            ..options()
        };
        let err = client.run(None, &mut conv, opts).await.unwrap_err();
        assert!(matches!(err, AgentError::TooManyToolPasses { limit: 3 }));
        assert_eq!(provider.calls(), 3);
        assert_eq!(tool_texts(&conv).len(), 3);
    }

    #[tokio::test]
    async fn test_per_call_failures_do_not_end_round() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![
                RawToolCall::new(Some("c1"), "ghost", "{}"),
                RawToolCall::new(Some("c2"), "echo", "{broken"),
                RawToolCall::new(Some("c3"), "boom", "{}"),
                RawToolCall::new(Some("c4"), "echo", r#"{"ok":true}"#),
            ]),
            _ => answer("recovered"),
        });
        let client = client(provider);
        let mut conv = session();

        assert_eq!(client.run(None, &mut conv, options()).await.unwrap(), "recovered");
        let texts = tool_texts(&conv);
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0], "[error] Tool \"ghost\" is not registered but was requested by the model");
        assert!(texts[1].starts_with("[error] Failed to parse tool arguments: "));
        assert_eq!(texts[2], "[error] Tool \"boom\" failed: disk full");
        assert_eq!(serde_json::from_str::<Value>(&texts[3]).unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_disable_tools_records_text_without_calls() {
        let provider = ScriptedProvider::new(|_| Completion {
            content: Some(" raw answer ".into()),
            tool_calls: vec![RawToolCall::new(Some("c1"), "echo", "{}")],
            reasoning: None,
        });
        let client = client(provider.clone());
        let mut conv = session();

        let opts = RunOptions {
            disable_tools: true,
            ..options()
        };
        assert_eq!(client.run(None, &mut conv, opts).await.unwrap(), "raw answer");
        assert_eq!(provider.calls(), 1);
        let last = conv.as_dicts().pop().unwrap();
        assert!(last.tool_calls.is_none());
        assert!(tool_texts(&conv).is_empty());
    }

    #[tokio::test]
    async fn test_reasoning_metadata_rules() {
        let provider = ScriptedProvider::new(|_| answer("ok"));
        let client = client(provider);

        let mut conv = session();
        client.run(Some("thinker"), &mut conv, options()).await.unwrap();
        let last = conv.as_dicts().pop().unwrap();
        assert_eq!(last.reasoning_content.as_deref(), Some(""));

        assert_eq!(reasoning_metadata(false, None), None);
        assert_eq!(
            reasoning_metadata(false, Some("hmm")).unwrap().reasoning_content,
            "hmm"
        );
    }

    #[tokio::test]
    async fn test_panicking_observers_are_ignored() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![RawToolCall::new(Some("c1"), "echo", "{}")]),
            _ => answer("fine"),
        });
        let client = client(provider);
        let mut conv = session();

        let on_tool_call: ToolCallCallback = Arc::new(|_: &ToolCallEvent| panic!("observer bug"));
        let opts = RunOptions {
            on_assistant_step: Some(Arc::new(|_: &AssistantStep| panic!("observer bug"))),
            on_tool_call: Some(on_tool_call),
            on_tool_result: Some(Arc::new(|_: &ToolResultEvent| panic!("observer bug"))),
            ..options()
        };
        assert_eq!(client.run(None, &mut conv, opts).await.unwrap(), "fine");
        assert_eq!(tool_texts(&conv), vec!["{}".to_string()]);
    }

    #[tokio::test]
    async fn test_task_tool_gets_fallback_title() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![RawToolCall::new(
                Some("t1"),
                "task_manager_add_task",
                r#"{"tasks":[{}]}"#,
            )]),
            _ => answer("added"),
        });
        let client = client(provider);
        let mut conv = ConversationManager::new();
        conv.add_user_message("fix the bug");

        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = seen.clone();
        let opts = RunOptions {
            on_tool_call: Some(Arc::new(move |e: &ToolCallEvent| {
                *sink.lock().unwrap() = Some(e.args.clone());
            })),
            ..options()
        };
        client.run(None, &mut conv, opts).await.unwrap();
        assert_eq!(
            seen.lock().unwrap().clone().unwrap(),
            json!({"tasks": [{"title": "fix the bug"}]})
        );
    }

    struct FailingHook;

    #[async_trait]
    impl BeforeRequestHook for FailingHook {
        async fn before_request(
            &self,
            _iteration: usize,
            _model: &str,
            _session: &mut dyn Session,
        ) -> anyhow::Result<()> {
            anyhow::bail!("compaction store unavailable")
        }
    }

    #[tokio::test]
    async fn test_before_request_failure_ends_run() {
        let provider = ScriptedProvider::new(|_| answer("never"));
        let client = client(provider.clone());
        let mut conv = session();

        let opts = RunOptions {
            on_before_request: Some(Arc::new(FailingHook)),
            ..options()
        };
        let err = client.run(None, &mut conv, opts).await.unwrap_err();
        assert!(matches!(err, AgentError::BeforeRequest { .. }));
        assert_eq!(provider.calls(), 0);
    }

    /// Cancels the run from inside the hook.
    struct CancelHook(CancellationToken);

    #[async_trait]
    impl BeforeRequestHook for CancelHook {
        async fn before_request(
            &self,
            _iteration: usize,
            _model: &str,
            _session: &mut dyn Session,
        ) -> anyhow::Result<()> {
            self.0.cancel();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_inside_hook_aborts_before_provider_call() {
        let provider = ScriptedProvider::new(|_| answer("never"));
        let client = client(provider.clone());
        let mut conv = session();
        let signal = CancellationToken::new();

        let opts = RunOptions {
            signal: Some(signal.clone()),
            on_before_request: Some(Arc::new(CancelHook(signal))),
            ..options()
        };
        assert!(client.run(None, &mut conv, opts).await.unwrap_err().is_abort());
        assert_eq!(provider.calls(), 0);
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_compaction_hook_shrinks_later_requests() {
        let pad = "x".repeat(600);
        let provider = ScriptedProvider::new(move |n| match n {
            0 => tool_turn(vec![RawToolCall::new(
                Some("c1"),
                "echo",
                &format!(r#"{{"path":"/tmp/notes.txt","pad":"{pad}"}}"#),
            )]),
            _ => answer("done"),
        });
        let client = client(provider.clone());

        let mut conv = ConversationManager::new();
        conv.add_system_message("You are a helpful assistant.");
        for i in 0..6 {
            conv.add_user_message(&format!("old question {i}"));
            conv.add_assistant(&format!("old answer {i}"), None, None);
        }
        conv.add_user_message("hello");

        let opts = RunOptions {
            on_before_request: Some(Arc::new(ContextCompactor::new(200, 2))),
            ..options()
        };
        assert_eq!(client.run(None, &mut conv, opts).await.unwrap(), "done");

        let seen = provider.seen.lock().unwrap();
        // Under budget on the first request; compacted after the tool round.
        assert_eq!(seen[0].len(), 14);
        assert_eq!(seen[1].len(), 5);
        let summary = seen[1][1].content.clone().unwrap();
        assert!(summary.contains("User: old question 0"));
        assert_eq!(seen[1][2].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_assistant_step_reasoning_matches_metadata() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![RawToolCall::new(Some("c1"), "echo", "{}")]),
            _ => answer("ok"),
        });
        let client = client(provider);
        let mut conv = session();

        let steps: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let sink = steps.clone();
        let opts = RunOptions {
            on_assistant_step: Some(Arc::new(move |step: &AssistantStep| {
                sink.lock().unwrap().push(step.reasoning.clone());
            })),
            ..options()
        };
        client.run(Some("thinker"), &mut conv, opts).await.unwrap();
        assert_eq!(*steps.lock().unwrap(), vec![Some(String::new())]);
        assert_eq!(conv.as_dicts()[1].reasoning_content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_tools_override_and_unknown_model() {
        let provider = ScriptedProvider::new(|n| match n {
            0 => tool_turn(vec![RawToolCall::new(Some("c1"), "echo", "{}")]),
            _ => answer("done"),
        });
        let client = client(provider);
        let mut conv = session();

        let opts = RunOptions {
            tools_override: Some(vec!["boom".to_string()]),
            ..options()
        };
        client.run(None, &mut conv, opts).await.unwrap();
        assert!(tool_texts(&conv)[0].contains("is not registered"));

        let err = client.run(Some("missing"), &mut conv, options()).await.unwrap_err();
        assert!(matches!(err, AgentError::Inference(InferenceError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_provider_cached_per_model() {
        let provider = ScriptedProvider::new(|_| answer("ok"));
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let factory = move |_settings: &ModelConfig| -> Result<Arc<dyn Provider>, InferenceError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(provider.clone() as Arc<dyn Provider>)
        };
        let client = AgentClient::new(
            ModelsConfig::from_yaml(MODELS_YAML).unwrap(),
            registry(),
            Arc::new(factory),
        );

        let mut conv = session();
        client.run(None, &mut conv, options()).await.unwrap();
        client.run(Some("stub"), &mut conv, options()).await.unwrap();
        client.run(Some("thinker"), &mut conv, options()).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(client.model_names(), vec!["stub", "thinker"]);
        assert_eq!(client.default_model().as_deref(), Some("stub"));
    }
}
