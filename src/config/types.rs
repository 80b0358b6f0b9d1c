// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::agents::{ORCHESTRATOR_AGENT_ID, UNIVERSAL_AGENT_ID};
use crate::error::ConfigError;
use crate::gateway::{OllamaModelDescription, ProviderType, DEFAULT_OLLAMA_HOST};

/// Environment variable holding the API key unless configured otherwise.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default location of the recordings database, relative to the workspace.
pub const DEFAULT_RECORDING_PATH: &str = ".switchyard/recordings.db";

/// Workspace configuration for switchyard.
/// Can be defined in .switchyard.json or .switchyard/config.json in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Provider to use (openai, ollama, openai-compatible)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Default model id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Custom base URL for API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model id per purpose, e.g. `"agent-selection": "gpt-4o-mini"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purposes: Option<HashMap<String, String>>,

    /// Agent that receives requests without an @mention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,

    /// Agent used when routing finds no candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_agent: Option<String>,

    /// Built-in agents to leave unregistered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_agents: Option<Vec<String>>,

    /// Local Ollama settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,

    /// Interaction recording settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<RecordingConfig>,

    /// Log level when RUST_LOG is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Ollama section of the workspace config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<OllamaModelDescription>>,
}

/// Recording section of the workspace config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Fully merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub purposes: HashMap<String, String>,
    pub default_agent: String,
    pub fallback_agent: String,
    pub disabled_agents: Vec<String>,
    pub ollama_host: Option<String>,
    pub ollama_models: Vec<OllamaModelDescription>,
    pub recording_enabled: bool,
    pub recording_path: String,
    pub log_level: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            purposes: HashMap::new(),
            default_agent: ORCHESTRATOR_AGENT_ID.to_string(),
            fallback_agent: UNIVERSAL_AGENT_ID.to_string(),
            disabled_agents: Vec::new(),
            ollama_host: Some(DEFAULT_OLLAMA_HOST.to_string()),
            ollama_models: Vec::new(),
            recording_enabled: true,
            recording_path: DEFAULT_RECORDING_PATH.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl ResolvedConfig {
    /// Check values that would only fail later at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.parse::<ProviderType>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "provider".to_string(),
                message: format!(
                    "unknown provider '{}', expected openai, ollama or openai-compatible",
                    self.provider
                ),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.default_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "defaultAgent".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Recording database path, resolved against `workspace_root` when relative.
    pub fn recording_path_in(&self, workspace_root: &std::path::Path) -> PathBuf {
        let path = PathBuf::from(&self.recording_path);
        if path.is_absolute() {
            path
        } else {
            workspace_root.join(path)
        }
    }
}
