//! Agent Core: the tool-calling loop and everything it mutates.
//!
//! Submodules:
//! - `orchestrator`: `AgentClient::run`, the model call → tool round loop
//! - `tool_router`: Tool registry and per-call dispatch
//! - `conversation`: `Session` contract and the in-memory conversation log
//! - `tool_result`: Formatting and sanitization of tool output
//! - `enrichment`: Task-manager payload enrichment
//! - `cancellation`: Abort checks and racing awaits against the signal
//! - `compaction`: Before-request hook folding old history into a summary
//! - `environment`: Env-derived knobs, read once per run
//! - `tokens`: Token estimation for compaction budgets
//! - `types`: Run options, observer callbacks and events
//! - `errors`: Agent-level error types

pub mod cancellation;
pub mod compaction;
pub mod conversation;
pub mod enrichment;
pub mod environment;
pub mod errors;
pub mod orchestrator;
pub mod tokens;
pub mod tool_result;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use compaction::ContextCompactor;
pub use conversation::{AssistantMetadata, Checkpoint, ConversationManager, Session};
pub use environment::LoopEnvironment;
pub use errors::{AgentError, ToolError};
pub use orchestrator::AgentClient;
pub use tool_router::{tool_fn, RegisteredTool, ToolContext, ToolHandler, ToolRegistry};
pub use types::{
    AssistantStep, BeforeRequestHook, RunOptions, ToolCallEvent, ToolResultEvent,
    DEFAULT_MAX_TOOL_PASSES,
};
