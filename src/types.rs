// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types shared by the gateway, agents and recorder.
//!
//! This module defines conversation messages, model responses, streaming
//! events and the [`LanguageModel`] trait every backend implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name used by chat-completion style APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Token Usage & Model Response
// ============================================================================

/// Token usage reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Get total tokens (input + output).
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Reason why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
}

impl StopReason {
    /// Map a backend finish reason onto a stop reason.
    pub fn from_finish_reason(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }
}

/// Complete response from a language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Full text of the response
    pub content: String,
    /// Reason for stopping generation
    pub stop_reason: StopReason,
    /// Token usage information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// Create a text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    /// Full text of the response.
    pub fn as_text(&self) -> &str {
        &self.content
    }
}

// ============================================================================
// Model Information
// ============================================================================

/// Information about a model known to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier (e.g., "gpt-4o", "llama3.2")
    pub id: String,
    /// Backend name (e.g., "OpenAI", "Ollama")
    pub provider: String,
    /// Size on disk, when the backend reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for a language model backend instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for the API endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model identifier to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Request timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Events emitted during streaming responses.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of text content.
    TextDelta(String),

    /// Token usage information (sent at end of stream).
    Usage(TokenUsage),

    /// Stream completed with stop reason.
    Done(StopReason),

    /// An error occurred during streaming.
    Error(String),
}

impl StreamEvent {
    /// Get the text content if this is a text delta.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextDelta(s) => Some(s),
            _ => None,
        }
    }
}

/// Callback receiving stream events.
pub type StreamCallback = Box<dyn Fn(StreamEvent) + Send + Sync>;

// ============================================================================
// Language Model Trait
// ============================================================================

/// Trait that all language model backends implement.
///
/// The gateway resolves a purpose to one of these and forwards the
/// conversation to it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a batched chat request.
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<ModelResponse, ProviderError>;

    /// Send a streaming chat request.
    ///
    /// `on_event` receives every fragment; the returned response carries the
    /// accumulated text.
    async fn stream_chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: StreamCallback,
    ) -> Result<ModelResponse, ProviderError>;

    /// Backend name for display purposes.
    fn name(&self) -> &str;

    /// Model identifier sent to the backend.
    fn model(&self) -> String;
}

/// Arc-wrapped model for shared ownership.
pub type SharedModel = std::sync::Arc<dyn LanguageModel>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello, world!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, world!");
    }

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason(Some("stop")), StopReason::EndTurn);
        assert_eq!(StopReason::from_finish_reason(Some("length")), StopReason::MaxTokens);
        assert_eq!(StopReason::from_finish_reason(None), StopReason::EndTurn);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::assistant("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"content\":\"test\""));
    }

    #[test]
    fn test_stream_event_as_text() {
        assert_eq!(StreamEvent::TextDelta("hi".into()).as_text(), Some("hi"));
        assert_eq!(StreamEvent::Done(StopReason::EndTurn).as_text(), None);
    }
}
