//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur at the provider boundary.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the caller's timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Stream parsing or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// Any other provider-reported failure.
    #[error("provider '{provider}' failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    /// Tool call arguments could not be parsed, even after repair.
    ///
    /// `raw_response` is the text the model emitted; `repaired` is the
    /// rewritten text when the repair pass changed anything.
    #[error("Failed to parse arguments for tool {tool}: {reason}")]
    ToolCallParseError {
        tool: String,
        raw_response: String,
        repaired: Option<String>,
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}
