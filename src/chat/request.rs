// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A single user turn and the context threaded through its processing.

use std::sync::Arc;

use tokio::sync::watch;

use crate::telemetry::CorrelationId;
use crate::types::Message;

use super::response::ChatResponse;
use super::session::ChatSession;

/// Typed per-request data set by components along the dispatch path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Id under which the orchestrator recorded its routing interaction.
    pub routing_id: Option<CorrelationId>,
}

/// One user turn within a session.
#[derive(Debug)]
pub struct ChatRequest {
    id: String,
    session: Arc<ChatSession>,
    message: String,
    pub context: RequestContext,
    response: ChatResponse,
    cancel: watch::Receiver<bool>,
}

impl ChatRequest {
    /// Create a request that can never be cancelled.
    pub fn new(session: Arc<ChatSession>, message: impl Into<String>, agent_id: &str) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::with_cancel(session, message, agent_id, rx)
    }

    /// Create a request observing a cancellation flag.
    pub fn with_cancel(
        session: Arc<ChatSession>,
        message: impl Into<String>,
        agent_id: &str,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session,
            message: message.into(),
            context: RequestContext::default(),
            response: ChatResponse::new(agent_id),
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &Arc<ChatSession> {
        &self.session
    }

    /// The originating user message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The user message as a conversation entry.
    pub fn user_message(&self) -> Message {
        Message::user(self.message.clone())
    }

    pub fn response(&self) -> &ChatResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ChatResponse {
        &mut self.response
    }

    /// Consume the request, keeping only its response.
    pub fn into_response(self) -> ChatResponse {
        self.response
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// A handle for awaiting cancellation with [`cancelled`].
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }
}

/// Resolve once the flag turns true.
///
/// Never resolves if the sender is dropped without cancelling.
pub async fn cancelled(mut signal: watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
