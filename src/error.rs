// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the switchyard dispatch core.
//!
//! This module provides strongly-typed errors for different parts of the application,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.

use thiserror::Error;

/// Errors that can occur while talking to a language model backend.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Streaming error: {0}")]
    StreamError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Map a reqwest failure onto the matching variant.
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised by the interaction recording store.
///
/// These never leave the recorder: the worker logs them and moves on.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to open recording store: {0}")]
    OpenFailed(String),

    #[error("Failed to write record: {0}")]
    WriteFailed(String),

    #[error("Failed to read records: {0}")]
    ReadFailed(String),

    #[error("Recorder worker is no longer running")]
    WorkerStopped,
}

impl From<rusqlite::Error> for RecordingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::WriteFailed(err.to_string())
    }
}

/// Errors raised when mutating a chat response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response is already complete")]
    Closed,

    #[error("Response agent was already reassigned to {0}")]
    AgentAlreadyReassigned(String),

    #[error("Unknown progress message: {0}")]
    UnknownProgress(String),
}

/// Errors that abort dispatching a request to an agent.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No chat agent available to handle request. Please check your configuration whether any are enabled.")]
    NoAgentAvailable,

    #[error("Chat agent {0} not found.")]
    AgentNotFound(String),

    #[error("Chat agent {0} is already registered.")]
    DuplicateAgent(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Language model error: {0}")]
    Model(#[from] ProviderError),

    #[error("Response error: {0}")]
    Response(#[from] ResponseError),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
