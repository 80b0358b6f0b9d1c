// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Interaction recording.
//!
//! Every routing decision is recorded as a [`RequestRecord`] (what was sent to
//! the model) and a [`ResponseRecord`] (what came back), linked by one
//! [`CorrelationId`]. Recording never fails the caller: implementations log
//! problems and move on.
//!
//! - [`InMemoryRecorder`] keeps records in memory for replay and tests.
//! - [`SqliteRecorder`] hands records to a background thread that writes them
//!   to a [`RecordingStore`].

mod storage;
mod writer;

pub use storage::{RecordingStore, SCHEMA_VERSION};
pub use writer::SqliteRecorder;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::telemetry::CorrelationId;
use crate::types::Message;

/// What an agent sent to the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub agent_id: String,
    pub session_id: String,
    pub correlation_id: CorrelationId,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl RequestRecord {
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        correlation_id: CorrelationId,
        messages: Vec<Message>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            correlation_id,
            messages,
            system_prompt,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// The raw text a language model answered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub agent_id: String,
    pub session_id: String,
    pub correlation_id: CorrelationId,
    pub response: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl ResponseRecord {
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        correlation_id: CorrelationId,
        response: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            correlation_id,
            response: response.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A request record and, once it arrived, its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedInteraction {
    pub request: RequestRecord,
    pub response: Option<ResponseRecord>,
}

/// Sink for recorded interactions.
///
/// Calls must not block and must not fail the caller.
#[cfg_attr(test, mockall::automock)]
pub trait RecordingService: Send + Sync {
    fn record_request(&self, record: RequestRecord);
    fn record_response(&self, record: ResponseRecord);
}

/// Shared recorder handle.
pub type SharedRecorder = Arc<dyn RecordingService>;

/// Recorder that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    requests: Mutex<Vec<RequestRecord>>,
    responses: Mutex<Vec<ResponseRecord>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn responses(&self) -> Vec<ResponseRecord> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Look up an interaction by correlation id.
    pub fn interaction(&self, correlation_id: &CorrelationId) -> Option<RecordedInteraction> {
        let request = self
            .requests()
            .into_iter()
            .find(|r| &r.correlation_id == correlation_id)?;
        let response = self
            .responses()
            .into_iter()
            .find(|r| &r.correlation_id == correlation_id);
        Some(RecordedInteraction { request, response })
    }
}

impl RecordingService for InMemoryRecorder {
    fn record_request(&self, record: RequestRecord) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    fn record_response(&self, record: ResponseRecord) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

/// Recorder that drops everything. Used for `--no-record`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl RecordingService for NullRecorder {
    fn record_request(&self, _record: RequestRecord) {}
    fn record_response(&self, _record: ResponseRecord) {}
}
