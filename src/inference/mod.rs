//! Inference boundary: everything between the agent loop and a model provider.
//!
//! - Provider capability traits (the HTTP clients themselves live elsewhere)
//! - Chat message and tool call types in the OpenAI Chat Completions shape
//! - Tool call normalization and argument parsing, with malformed-JSON repair
//! - Model registry loading from `config/models.yaml`

pub mod config;
pub mod errors;
pub mod json_repair;
pub mod provider;
pub mod tool_call_parser;
pub mod types;

// Re-exports for convenience
pub use config::{ModelConfig, ModelsConfig};
pub use errors::InferenceError;
pub use provider::{Provider, ProviderFactory};
pub use types::{
    ChatMessage, Completion, ProviderOptions, RawToolCall, Role, ToolCallResponse, ToolDefinition,
};
