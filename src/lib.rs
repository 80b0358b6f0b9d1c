// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Switchyard - agent dispatch core for AI chat.
//!
//! Routes each chat request to the specialized agent best suited to answer
//! it. The routing decision is itself made by a language model.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (Message, ModelResponse, LanguageModel, etc.)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`gateway`] - Purpose-based language model gateway (OpenAI, Ollama)
//! - [`chat`] - Sessions, requests and streaming responses
//! - [`prompts`] - Prompt templates and `{{variable}}` rendering
//! - [`agents`] - Chat agents, the registry and the orchestrator
//! - [`recording`] - Request/response recording for routing interactions
//! - [`service`] - Chat service that runs requests through the registry
//! - [`telemetry`] - Tracing, metrics, and correlation ids
//!
//! # Example
//!
//! ```rust,ignore
//! use switchyard::agents::{AgentRegistry, AgentSettings};
//! use switchyard::config::{load_config, CliOptions};
//! use switchyard::gateway::build_gateway;
//! use switchyard::prompts::PromptService;
//! use switchyard::recording::NullRecorder;
//! use switchyard::service::ChatService;
//!
//! let config = load_config(&root, CliOptions::default())?;
//! let (gateway, _ollama) = build_gateway(&config).await?;
//! let prompts = Arc::new(PromptService::with_builtins().await);
//! let registry = AgentRegistry::with_defaults(
//!     gateway,
//!     prompts,
//!     Arc::new(NullRecorder),
//!     &AgentSettings::default(),
//! )
//! .await?;
//!
//! let service = ChatService::new(registry, &config.default_agent);
//! let handle = service.send_request(service.create_session(), "Explain this trait").await;
//! let response = handle.wait().await?;
//! ```

pub mod agents;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prompts;
pub mod recording;
pub mod service;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use agents::{AgentRegistry, ChatAgent, OrchestratorAgent, SharedAgent};
pub use chat::{ChatRequest, ChatResponse, ChatSession, ResponseContent, ResponseEvent};
pub use error::{ConfigError, DispatchError, ProviderError, RecordingError, Result};
pub use gateway::{LanguageModelGateway, ProviderType};
pub use service::{ChatRequestHandle, ChatService};
pub use types::{
    LanguageModel, Message, ModelInfo, ModelResponse, ProviderConfig, Role, SharedModel,
    StreamEvent, TokenUsage,
};

/// Switchyard version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
