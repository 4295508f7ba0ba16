//! Provider capability contracts.
//!
//! The agent loop only talks to models through `Provider`. Concrete HTTP
//! clients live outside this crate and are plugged in through a
//! `ProviderFactory` keyed by the `provider` field of a model config.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::ModelConfig;
use super::errors::InferenceError;
use super::types::{ChatMessage, Completion, ProviderOptions};

/// A chat-completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one completion over the full message list.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &ProviderOptions,
    ) -> Result<Completion, InferenceError>;

    /// Whether assistant turns must carry a `reasoning_content` field.
    fn supports_reasoning_content(&self) -> bool {
        false
    }
}

/// Builds providers from model settings.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, model: &ModelConfig) -> Result<Arc<dyn Provider>, InferenceError>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&ModelConfig) -> Result<Arc<dyn Provider>, InferenceError> + Send + Sync,
{
    fn create(&self, model: &ModelConfig) -> Result<Arc<dyn Provider>, InferenceError> {
        self(model)
    }
}
