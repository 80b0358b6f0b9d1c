// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI-compatible backend.
//!
//! Talks to the Chat Completions API of OpenAI or any compatible server
//! (Azure OpenAI, Together, Groq, vLLM, Ollama's `/v1` shim).
//!
//! Streaming responses are read chunk by chunk as server-sent events, so text
//! deltas reach the caller while the model is still generating.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "telemetry")]
use tracing::debug;

#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;

use crate::error::ProviderError;
use crate::types::{
    LanguageModel, Message, ModelInfo, ModelResponse, ProviderConfig, StopReason, StreamCallback,
    StreamEvent, TokenUsage,
};

use super::LineBuffer;

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default max tokens if not specified.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// OpenAI-compatible chat backend.
pub struct OpenAIModel {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
    timeout_ms: u64,
    provider_name: String,
}

impl OpenAIModel {
    /// Create a new backend.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let provider_name = Self::detect_provider_name(&base_url);

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url,
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
            timeout_ms: timeout.as_millis() as u64,
            provider_name,
        })
    }

    /// Detect provider name from base URL.
    fn detect_provider_name(base_url: &str) -> String {
        if base_url.contains("openai.com") {
            "OpenAI"
        } else if base_url.contains("localhost:11434") || base_url.contains("ollama") {
            "Ollama"
        } else if base_url.contains("azure") {
            "Azure OpenAI"
        } else if base_url.contains("groq") {
            "Groq"
        } else {
            "OpenAI-Compatible"
        }
        .to_string()
    }

    fn build_request(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        stream: bool,
    ) -> CompletionRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            api_messages.push(ApiMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        api_messages.extend(messages.iter().map(ApiMessage::from));

        CompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    async fn post(&self, body: &CompletionRequest) -> Result<reqwest::Response, ProviderError> {
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("content-type", "application/json");

        if let Some(ref api_key) = self.api_key {
            req = req.header("authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status.as_u16(), &error_text));
        }
        Ok(response)
    }

    /// Handle an error response from the API.
    fn handle_error_response(status_code: u16, body: &str) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<ApiError>(body) {
            let message = error.error.message;
            match error.error.error_type.as_deref() {
                Some("authentication_error") | Some("invalid_api_key") => {
                    ProviderError::AuthError(message)
                }
                Some("rate_limit_error") | Some("rate_limit_exceeded") => {
                    ProviderError::RateLimited(message)
                }
                Some("model_not_found") => ProviderError::ModelNotFound(message),
                _ => ProviderError::api(message, status_code),
            }
        } else if status_code == 401 {
            ProviderError::AuthError(body.to_string())
        } else if status_code == 429 {
            ProviderError::RateLimited(body.to_string())
        } else {
            ProviderError::api(body.to_string(), status_code)
        }
    }

    /// Apply one SSE line to the stream state. Returns false on `[DONE]`.
    fn process_sse_line(line: &str, state: &mut StreamState, on_event: &StreamCallback) -> bool {
        let Some(data) = line.strip_prefix("data:") else {
            return true;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return false;
        }

        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
            if let Some(usage) = chunk.usage {
                state.usage = Some(TokenUsage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }
            for choice in chunk.choices {
                if choice.finish_reason.is_some() {
                    state.stop_reason = StopReason::from_finish_reason(choice.finish_reason.as_deref());
                }
                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        state.text.push_str(&content);
                        on_event(StreamEvent::TextDelta(content));
                    }
                }
            }
        }
        true
    }

    #[cfg(feature = "telemetry")]
    fn record_usage(response: &ModelResponse) {
        if let Some(ref usage) = response.usage {
            GLOBAL_METRICS.record_tokens(usage.input_tokens as u64, usage.output_tokens as u64);
        }
    }

    /// List models served by the endpoint.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut req = self.client.get(format!("{}/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(models
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                provider: self.provider_name.clone(),
                size_bytes: None,
            })
            .collect())
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<ModelResponse, ProviderError> {
        #[cfg(feature = "telemetry")]
        debug!(model = %self.model, messages = messages.len(), "Sending chat request");

        let request = self.build_request(messages, system_prompt, false);
        let response = self.post(&request).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        let model_response: ModelResponse = completion.into();

        #[cfg(feature = "telemetry")]
        Self::record_usage(&model_response);

        Ok(model_response)
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: StreamCallback,
    ) -> Result<ModelResponse, ProviderError> {
        #[cfg(feature = "telemetry")]
        debug!(model = %self.model, messages = messages.len(), "Sending streaming chat request");

        let request = self.build_request(messages, system_prompt, true);
        let mut response = self.post(&request).await?;

        let mut state = StreamState::default();
        let mut buffer = LineBuffer::default();
        let mut open = true;

        while open {
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
                if !Self::process_sse_line(&line, &mut state, &on_event) {
                    open = false;
                    break;
                }
            }
        }
        if open {
            if let Some(rest) = buffer.finish() {
                Self::process_sse_line(&rest, &mut state, &on_event);
            }
        }

        if let Some(ref usage) = state.usage {
            on_event(StreamEvent::Usage(usage.clone()));
        }
        on_event(StreamEvent::Done(state.stop_reason));

        let model_response = state.into_response();

        #[cfg(feature = "telemetry")]
        Self::record_usage(&model_response);

        Ok(model_response)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

/// State accumulated during streaming.
struct StreamState {
    text: String,
    stop_reason: StopReason,
    usage: Option<TokenUsage>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            text: String::new(),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }
}

impl StreamState {
    fn into_response(self) -> ModelResponse {
        ModelResponse {
            content: self.text,
            stop_reason: self.stop_reason,
            usage: self.usage,
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelData>,
}

#[derive(Debug, Deserialize)]
struct ModelData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl From<CompletionResponse> for ModelResponse {
    fn from(response: CompletionResponse) -> Self {
        let (content, stop_reason) = match response.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                StopReason::from_finish_reason(choice.finish_reason.as_deref()),
            ),
            None => (String::new(), StopReason::EndTurn),
        };

        Self {
            content,
            stop_reason,
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        }
    }
}
