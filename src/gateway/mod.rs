// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language model gateway.
//!
//! Agents never hold a model directly. They ask the gateway to send messages
//! for a *purpose* (`"chat"`, `"agent-selection"`), and the gateway resolves
//! the purpose to a registered model at call time:
//!
//! 1. the model mapped to the purpose, if it is registered
//! 2. otherwise the default model, if it is registered
//! 3. otherwise [`ProviderError::NotConfigured`]
//!
//! Backends:
//!
//! - [`openai::OpenAIModel`] - OpenAI and OpenAI-compatible endpoints
//! - [`ollama::OllamaModel`] - local Ollama via its native API, managed by
//!   [`ollama::OllamaModelsManager`]
//!
//! # Example
//!
//! ```rust,ignore
//! use switchyard::gateway::{LanguageModelGateway, AGENT_SELECTION_PURPOSE};
//!
//! let gateway = LanguageModelGateway::new();
//! gateway.register_model("gpt-4o", model).await;
//! gateway.set_purpose(AGENT_SELECTION_PURPOSE, "gpt-4o-mini").await;
//! let reply = gateway.send(AGENT_SELECTION_PURPOSE, &messages, Some(prompt), None).await?;
//! ```

pub mod ollama;
pub mod openai;

pub use ollama::{OllamaModel, OllamaModelDescription, OllamaModelsManager, DEFAULT_OLLAMA_HOST};
pub use openai::OpenAIModel;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::error::ProviderError;
use crate::telemetry::TimedOperation;
use crate::types::{Message, ModelResponse, ProviderConfig, SharedModel, StreamCallback};

/// Purpose used by the orchestrator to pick an agent.
pub const AGENT_SELECTION_PURPOSE: &str = "agent-selection";

/// Purpose used by conversational agents.
pub const CHAT_PURPOSE: &str = "chat";

#[derive(Default)]
struct Catalog {
    models: Vec<(String, SharedModel)>,
    purposes: HashMap<String, String>,
    default_model: Option<String>,
}

impl Catalog {
    fn find(&self, id: &str) -> Option<&SharedModel> {
        self.models.iter().find(|(m, _)| m == id).map(|(_, model)| model)
    }
}

/// Purpose-based access to the registered language models.
#[derive(Default)]
pub struct LanguageModelGateway {
    catalog: RwLock<Catalog>,
}

impl LanguageModelGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under `id`, replacing any model with the same id.
    pub async fn register_model(&self, id: impl Into<String>, model: SharedModel) {
        let id = id.into();
        let mut catalog = self.catalog.write().await;
        if let Some(slot) = catalog.models.iter_mut().find(|(m, _)| *m == id) {
            debug!(id = %id, "Replacing language model");
            slot.1 = model;
        } else {
            debug!(id = %id, "Registering language model");
            catalog.models.push((id, model));
        }
    }

    /// Remove a model. Returns whether it was registered.
    pub async fn remove_model(&self, id: &str) -> bool {
        let mut catalog = self.catalog.write().await;
        let before = catalog.models.len();
        catalog.models.retain(|(m, _)| m != id);
        before != catalog.models.len()
    }

    /// Map a purpose to a model id.
    pub async fn set_purpose(&self, purpose: impl Into<String>, model_id: impl Into<String>) {
        self.catalog
            .write()
            .await
            .purposes
            .insert(purpose.into(), model_id.into());
    }

    /// Set the model used when a purpose has no usable mapping.
    pub async fn set_default_model(&self, model_id: impl Into<String>) {
        self.catalog.write().await.default_model = Some(model_id.into());
    }

    /// Registered model ids in registration order.
    pub async fn models(&self) -> Vec<String> {
        self.catalog
            .read()
            .await
            .models
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub async fn get_model(&self, id: &str) -> Option<SharedModel> {
        self.catalog.read().await.find(id).cloned()
    }

    /// Resolve a purpose to `(model id, model)`.
    pub async fn resolve(&self, purpose: &str) -> Result<(String, SharedModel), ProviderError> {
        let catalog = self.catalog.read().await;

        if let Some(id) = catalog.purposes.get(purpose) {
            if let Some(model) = catalog.find(id) {
                return Ok((id.clone(), model.clone()));
            }
            warn!(purpose = %purpose, model = %id, "Purpose mapped to unregistered model, using default");
        }

        catalog
            .default_model
            .as_ref()
            .and_then(|id| catalog.find(id).map(|model| (id.clone(), model.clone())))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "No language model available for purpose '{}'",
                    purpose
                ))
            })
    }

    /// Send messages to the model serving `purpose`.
    ///
    /// With `on_event` the model streams and the callback sees each delta.
    pub async fn send(
        &self,
        purpose: &str,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: Option<StreamCallback>,
    ) -> Result<ModelResponse, ProviderError> {
        let (id, model) = self.resolve(purpose).await?;
        let _timer = TimedOperation::start("gateway.send");
        debug!(purpose = %purpose, model = %id, streaming = on_event.is_some(), "Sending to language model");

        match on_event {
            Some(callback) => model.stream_chat(messages, system_prompt, callback).await,
            None => model.chat(messages, system_prompt).await,
        }
    }
}

/// Supported backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// OpenAI GPT models
    OpenAI,
    /// Ollama local models
    Ollama,
    /// Any OpenAI-compatible API
    OpenAICompatible,
}

impl ProviderType {
    /// Get the default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI | Self::OpenAICompatible => "gpt-4o",
            Self::Ollama => "llama3.2",
        }
    }

    /// Get the default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI | Self::OpenAICompatible => openai::OPENAI_BASE_URL,
            Self::Ollama => DEFAULT_OLLAMA_HOST,
        }
    }

    /// Check if this provider requires an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI)
    }
}

/// Error type for parsing a provider type from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProviderTypeError;

impl std::fmt::Display for ParseProviderTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider type")
    }
}

impl std::error::Error for ParseProviderTypeError {}

impl std::str::FromStr for ProviderType {
    type Err = ParseProviderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "openai-compatible" | "openai_compatible" => Ok(Self::OpenAICompatible),
            _ => Err(ParseProviderTypeError),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
            Self::OpenAICompatible => write!(f, "OpenAI-Compatible"),
        }
    }
}

/// Create an OpenAI-style model from type and configuration.
///
/// Ollama models go through [`OllamaModelsManager`] instead so they share a
/// host setting.
pub fn create_model(
    provider_type: ProviderType,
    config: ProviderConfig,
) -> Result<SharedModel, ProviderError> {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider_type.default_model().to_string());
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| provider_type.default_base_url().to_string());

    match provider_type {
        ProviderType::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("API key required for OpenAI".to_string())
            })?;
            Ok(Arc::new(OpenAIModel::new(Some(api_key), model, base_url, &config)?))
        }
        ProviderType::OpenAICompatible => Ok(Arc::new(OpenAIModel::new(
            config.api_key.clone(),
            model,
            base_url,
            &config,
        )?)),
        ProviderType::Ollama => Err(ProviderError::UnsupportedOperation(
            "Ollama models are registered through OllamaModelsManager".to_string(),
        )),
    }
}

/// Provider settings for the configured OpenAI-style endpoint.
///
/// The API key is read from the environment variable named by
/// `api_key_env`; an empty value counts as unset.
pub fn provider_config(config: &ResolvedConfig) -> ProviderConfig {
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.is_empty());
    let provider_config = ProviderConfig {
        api_key,
        model: Some(config.model.clone()),
        ..Default::default()
    };
    match config.base_url {
        Some(ref url) => provider_config.with_base_url(url.clone()),
        None => provider_config,
    }
}

/// Client for listing the models an OpenAI-style endpoint serves.
pub fn remote_catalog(config: &ResolvedConfig) -> Result<OpenAIModel, ProviderError> {
    let provider_type: ProviderType = config.provider.parse().map_err(|_| {
        ProviderError::NotConfigured(format!("Unknown provider '{}'", config.provider))
    })?;
    if provider_type == ProviderType::Ollama {
        return Err(ProviderError::UnsupportedOperation(
            "Use `models local` for Ollama".to_string(),
        ));
    }
    let settings = provider_config(config);
    if provider_type.requires_api_key() && settings.api_key.is_none() {
        return Err(ProviderError::NotConfigured(format!(
            "Set {} to list OpenAI models",
            config.api_key_env
        )));
    }
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| provider_type.default_base_url().to_string());
    OpenAIModel::new(settings.api_key.clone(), config.model.clone(), base_url, &settings)
}

/// Build a gateway from resolved configuration.
///
/// A missing API key is logged rather than returned, so commands that never
/// touch a model still work. Sends then fail with `NotConfigured`.
pub async fn build_gateway(
    config: &ResolvedConfig,
) -> Result<(Arc<LanguageModelGateway>, OllamaModelsManager), ProviderError> {
    let gateway = Arc::new(LanguageModelGateway::new());
    let ollama = OllamaModelsManager::new(gateway.clone(), config.ollama_host.clone());

    let provider_type: ProviderType = config.provider.parse().map_err(|_| {
        ProviderError::NotConfigured(format!("Unknown provider '{}'", config.provider))
    })?;

    match provider_type {
        ProviderType::Ollama => {
            ollama
                .create_or_update_language_models(&[OllamaModelDescription::new(
                    config.model.clone(),
                    config.model.clone(),
                )])
                .await;
        }
        _ => {
            match create_model(provider_type, provider_config(config)) {
                Ok(model) => gateway.register_model(config.model.clone(), model).await,
                Err(ProviderError::NotConfigured(reason)) => {
                    warn!(provider = %provider_type, "{}", reason);
                }
                Err(e) => return Err(e),
            }
        }
    }

    if !config.ollama_models.is_empty() {
        ollama
            .create_or_update_language_models(&config.ollama_models)
            .await;
    }

    gateway.set_default_model(config.model.clone()).await;
    for (purpose, model_id) in &config.purposes {
        gateway.set_purpose(purpose.clone(), model_id.clone()).await;
    }

    info!(
        provider = %provider_type,
        model = %config.model,
        models = gateway.models().await.len(),
        "Language model gateway ready"
    );
    Ok((gateway, ollama))
}

/// Splits a streamed response body into lines.
///
/// Bytes are held until a newline arrives so a multi-byte character split
/// across network chunks is decoded whole.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line[..pos]);
        Some(line.trim_end_matches('\r').to_string())
    }

    /// Whatever is left once the body has ended.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.bytes);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}
