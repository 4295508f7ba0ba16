//! Model configuration loading and resolution.
//!
//! Reads `config/models.yaml` and resolves environment variables. The config
//! maps model names to provider settings and the tool names each model may
//! call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

/// Relative location of the models file under a project root.
const CONFIG_RELATIVE_PATH: &str = "config/models.yaml";

/// Env var pointing at the project root (checked before walking upward).
const PROJECT_ROOT_ENV: &str = "AIDE_PROJECT_ROOT";

// ─── Public Types ────────────────────────────────────────────────────────────

/// A single model's runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Registry key; filled in from the map key when loading.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Provider kind handed to the `ProviderFactory` (e.g. `"openai"`).
    pub provider: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the env var holding the API key. The key itself is never stored.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Tool names exposed to this model unless a run overrides them.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub supports_reasoning: bool,
}

/// Top-level model registry (mirrors `config/models.yaml`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelsConfig {
    pub active_model: String,
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
}

impl ModelsConfig {
    /// Parse a YAML document (after env-var interpolation).
    pub fn from_yaml(raw: &str) -> Result<Self, InferenceError> {
        let interpolated = interpolate_env_vars(raw);
        let mut config: ModelsConfig =
            serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
                reason: format!("failed to parse config: {e}"),
            })?;
        for (key, model) in config.models.iter_mut() {
            model.name = key.clone();
        }
        Ok(config)
    }

    /// Model keys, sorted for stable display.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate `config/models.yaml`.
///
/// Checks `AIDE_PROJECT_ROOT` first, then searches upward from `start`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let candidate = PathBuf::from(&root).join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!("could not find {CONFIG_RELATIVE_PATH}"),
    })
}

/// Load and parse the models configuration file.
///
/// Performs environment-variable interpolation on values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_models_config(path: &Path) -> Result<ModelsConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    ModelsConfig::from_yaml(&raw)
}

/// Resolve a model by name, or the active model when `name` is `None`/blank.
///
/// An explicit name must exist. The active model falls back along
/// `fallback_chain` when it is missing from the registry.
pub fn resolve_model(config: &ModelsConfig, name: Option<&str>) -> Result<ModelConfig, InferenceError> {
    if let Some(requested) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return config
            .models
            .get(requested)
            .cloned()
            .ok_or_else(|| InferenceError::ConfigError {
                reason: format!("model '{requested}' not found in config"),
            });
    }

    if let Some(model) = config.models.get(&config.active_model) {
        return Ok(model.clone());
    }

    for key in &config.fallback_chain {
        if let Some(model) = config.models.get(key) {
            tracing::warn!(
                active = %config.active_model,
                fallback = %key,
                "active model missing; using fallback"
            );
            return Ok(model.clone());
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!(
            "active model '{}' not found in config and no fallback available",
            config.active_model
        ),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some((var_name, default)) = expr.split_once(":-") {
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
