// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ollama backend and the manager that keeps Ollama models in the gateway.
//!
//! Every [`OllamaModel`] created by one [`OllamaModelsManager`] shares the
//! manager's host setting, so changing the host takes effect on the next call
//! without re-registering anything.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;

use crate::error::ProviderError;
use crate::types::{
    LanguageModel, Message, ModelInfo, ModelResponse, StopReason, StreamCallback, StreamEvent,
    TokenUsage,
};

use super::{LanguageModelGateway, LineBuffer};

/// Default Ollama host.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

type SharedHost = Arc<RwLock<Option<String>>>;

/// Describes one Ollama model to expose through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaModelDescription {
    /// Identifier shown to users and used for purpose mapping.
    pub id: String,
    /// Name of the model inside Ollama, e.g. `llama3.1:8b`.
    pub model: String,
}

impl OllamaModelDescription {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}

fn read_host(host: &SharedHost) -> Option<String> {
    host.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// A model served by a local Ollama instance via `/api/chat`.
pub struct OllamaModel {
    client: Client,
    host: SharedHost,
    model: RwLock<String>,
}

impl OllamaModel {
    fn new(client: Client, host: SharedHost, model: impl Into<String>) -> Self {
        Self {
            client,
            host,
            model: RwLock::new(model.into()),
        }
    }

    /// Change the Ollama model name this entry talks to.
    pub fn set_model(&self, model: &str) {
        *self.model.write().unwrap_or_else(|e| e.into_inner()) = model.to_string();
    }

    fn current_model(&self) -> String {
        self.model.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn endpoint(&self) -> Result<String, ProviderError> {
        let host = read_host(&self.host)
            .ok_or_else(|| ProviderError::NotConfigured("Ollama host is not set".to_string()))?;
        Ok(format!("{}/api/chat", host.trim_end_matches('/')))
    }

    fn build_request(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        stream: bool,
    ) -> OllamaChatRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            api_messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        api_messages.extend(messages.iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        OllamaChatRequest {
            model: self.current_model(),
            messages: api_messages,
            stream,
        }
    }

    async fn post(&self, body: &OllamaChatRequest) -> Result<reqwest::Response, ProviderError> {
        let url = self.endpoint()?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("Failed to connect to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 404 {
                ProviderError::ModelNotFound(body)
            } else {
                ProviderError::api(body, status.as_u16())
            });
        }
        Ok(response)
    }
}

/// Apply one NDJSON line. Returns true once the final chunk is seen.
fn apply_chunk(
    line: &str,
    text: &mut String,
    usage: &mut Option<TokenUsage>,
    on_event: &StreamCallback,
) -> Result<bool, ProviderError> {
    let mut chunk: OllamaChatChunk = serde_json::from_str(line)
        .map_err(|e| ProviderError::StreamError(format!("Malformed Ollama chunk: {}", e)))?;
    if let Some(error) = chunk.error.take() {
        return Err(ProviderError::StreamError(error));
    }
    if chunk.done {
        *usage = chunk.token_usage();
    }
    if let Some(message) = chunk.message.take() {
        if !message.content.is_empty() {
            text.push_str(&message.content);
            on_event(StreamEvent::TextDelta(message.content));
        }
    }
    Ok(chunk.done)
}

fn apply_stream_line(
    line: &str,
    text: &mut String,
    usage: &mut Option<TokenUsage>,
    on_event: &StreamCallback,
) -> Result<bool, ProviderError> {
    apply_chunk(line, text, usage, on_event).inspect_err(|e| {
        warn!(error = %e, "Ollama stream failed");
        on_event(StreamEvent::Error(e.to_string()));
    })
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<ModelResponse, ProviderError> {
        let request = self.build_request(messages, system_prompt, false);
        let response = self.post(&request).await?;
        let chunk: OllamaChatChunk = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let usage = chunk.token_usage();
        #[cfg(feature = "telemetry")]
        if let Some(ref u) = usage {
            GLOBAL_METRICS.record_tokens(u.input_tokens as u64, u.output_tokens as u64);
        }

        Ok(ModelResponse {
            content: chunk.message.map(|m| m.content).unwrap_or_default(),
            stop_reason: StopReason::EndTurn,
            usage,
        })
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: StreamCallback,
    ) -> Result<ModelResponse, ProviderError> {
        let request = self.build_request(messages, system_prompt, true);
        let mut response = self.post(&request).await?;

        let mut text = String::new();
        let mut usage = None;
        let mut buffer = LineBuffer::default();
        let mut done = false;

        while !done {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    on_event(StreamEvent::Error(e.to_string()));
                    return Err(ProviderError::StreamError(e.to_string()));
                }
            };
            buffer.push(&chunk);

            while let Some(line) = buffer.next_line() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if apply_stream_line(line, &mut text, &mut usage, &on_event)? {
                    done = true;
                    break;
                }
            }
        }
        if !done {
            if let Some(rest) = buffer.finish() {
                if !rest.trim().is_empty() {
                    apply_stream_line(rest.trim(), &mut text, &mut usage, &on_event)?;
                }
            }
        }

        if let Some(ref u) = usage {
            on_event(StreamEvent::Usage(u.clone()));
            #[cfg(feature = "telemetry")]
            GLOBAL_METRICS.record_tokens(u.input_tokens as u64, u.output_tokens as u64);
        }
        on_event(StreamEvent::Done(StopReason::EndTurn));

        Ok(ModelResponse {
            content: text,
            stop_reason: StopReason::EndTurn,
            usage,
        })
    }

    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> String {
        self.current_model()
    }
}

/// Keeps a set of Ollama models registered in a gateway.
pub struct OllamaModelsManager {
    gateway: Arc<LanguageModelGateway>,
    client: Client,
    host: SharedHost,
    models: Mutex<HashMap<String, Arc<OllamaModel>>>,
}

impl OllamaModelsManager {
    /// Create a manager registering into `gateway`.
    pub fn new(gateway: Arc<LanguageModelGateway>, host: Option<String>) -> Self {
        Self {
            gateway,
            client: Client::new(),
            host: Arc::new(RwLock::new(host)),
            models: Mutex::new(HashMap::new()),
        }
    }

    /// The current host, if any.
    pub fn host(&self) -> Option<String> {
        read_host(&self.host)
    }

    /// Change the host for every managed model.
    pub fn set_host(&self, host: Option<String>) {
        info!(host = ?host, "Ollama host changed");
        *self.host.write().unwrap_or_else(|e| e.into_inner()) = host;
    }

    /// Register new models, or point existing ids at a new Ollama model name.
    pub async fn create_or_update_language_models(&self, descriptions: &[OllamaModelDescription]) {
        let mut models = self.models.lock().await;
        for description in descriptions {
            if let Some(existing) = models.get(&description.id) {
                debug!(id = %description.id, model = %description.model, "Updating Ollama model");
                existing.set_model(&description.model);
                continue;
            }

            debug!(id = %description.id, model = %description.model, "Registering Ollama model");
            let model = Arc::new(OllamaModel::new(
                self.client.clone(),
                self.host.clone(),
                description.model.clone(),
            ));
            self.gateway
                .register_model(description.id.clone(), model.clone())
                .await;
            models.insert(description.id.clone(), model);
        }
    }

    /// Remove models from the gateway. Unknown ids are ignored.
    pub async fn remove_language_models(&self, ids: &[String]) {
        let mut models = self.models.lock().await;
        for id in ids {
            if models.remove(id).is_some() {
                self.gateway.remove_model(id).await;
            } else {
                warn!(id = %id, "Tried to remove an unmanaged Ollama model");
            }
        }
    }

    /// Ids currently managed.
    pub async fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Models pulled into the local Ollama instance.
    pub async fn list_local_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let host = self
            .host()
            .ok_or_else(|| ProviderError::NotConfigured("Ollama host is not set".to_string()))?;
        let url = format!("{}/api/tags", host.trim_end_matches('/'));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("Failed to connect to Ollama: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(body, status));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name,
                provider: "Ollama".to_string(),
                size_bytes: m.size,
            })
            .collect())
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaChatChunk {
    fn token_usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (input, output) => Some(TokenUsage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}
