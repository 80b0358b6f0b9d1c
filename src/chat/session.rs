// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chat sessions: an id plus the conversation history shared by its turns.

use tokio::sync::RwLock;

use crate::types::Message;

/// Session identifier.
pub type SessionId = String;

/// A conversation that chat requests belong to.
#[derive(Debug)]
pub struct ChatSession {
    id: SessionId,
    created_at: i64,
    messages: RwLock<Vec<Message>>,
}

impl ChatSession {
    /// Create an empty session with a generated id.
    pub fn new() -> Self {
        Self::with_id(Self::generate_id())
    }

    /// Create an empty session with a known id.
    pub fn with_id(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            created_at: chrono::Utc::now().timestamp(),
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Generate a session id based on timestamp and UUID.
    pub fn generate_id() -> SessionId {
        let now = chrono::Utc::now();
        let short_uuid = &uuid::Uuid::new_v4().simple().to_string()[..8];
        format!("session-{}-{}", now.format("%Y-%m-%d-%H-%M-%S"), short_uuid)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time in Unix epoch seconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Snapshot of the history.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Append one finished exchange to the history.
    pub async fn append_exchange(&self, user: Message, assistant: Message) {
        let mut messages = self.messages.write().await;
        messages.push(user);
        messages.push(assistant);
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
