//! Tool-calling agent core.
//!
//! Drives an LLM provider through "model call → tool execution → model call"
//! rounds until the model answers, repairing malformed tool arguments,
//! sanitizing tool output and rolling the session back on abort.

pub mod agent_core;
pub mod inference;

pub use agent_core::{
    AgentClient, AgentError, ConversationManager, RunOptions, Session, ToolError, ToolRegistry,
};
pub use inference::{InferenceError, ModelsConfig, Provider, ProviderFactory};

/// Env var switching log output to JSON lines.
const LOG_JSON_ENV: &str = "AIDE_LOG_JSON";

/// Initialize the tracing subscriber: structured logs to stderr.
///
/// Filtering follows `RUST_LOG` (default `aide_core=info,warn`). Setting
/// `AIDE_LOG_JSON=1` emits one JSON object per event. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aide_core=info,warn"));
    let json = std::env::var(LOG_JSON_ENV).is_ok_and(|v| v == "1");

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.with_ansi(false).try_init()
    };

    if installed.is_ok() {
        tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tracing initialized");
    }
}
