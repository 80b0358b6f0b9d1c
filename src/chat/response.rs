// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The per-request response channel.
//!
//! A [`ChatResponse`] is owned by exactly one [`ChatRequest`](super::ChatRequest)
//! and handed by `&mut` to whichever agent is currently producing output.
//! Every mutation is also published as a [`ResponseEvent`] so observers (the
//! CLI, a UI) can render progress before the request finishes.
//!
//! Once completed or failed the response is frozen and further writes are
//! rejected with [`ResponseError::Closed`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ResponseError;

/// Capacity of the observer channel. Slow observers lag rather than block.
const EVENT_CAPACITY: usize = 256;

/// A fragment of response content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ResponseContent {
    /// Markdown text produced by an agent.
    Text(String),
    /// A notice for the user that is not part of the answer itself.
    Informational(String),
}

impl ResponseContent {
    /// Text of the fragment regardless of kind.
    pub fn as_str(&self) -> &str {
        match self {
            ResponseContent::Text(text) | ResponseContent::Informational(text) => text,
        }
    }
}

/// Status of a progress entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
    Failed,
}

/// A status marker shown while work is underway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub id: String,
    pub content: String,
    pub status: ProgressStatus,
}

/// Lifecycle of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseState {
    Pending,
    Complete,
    Failed(String),
}

/// Change notifications published to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// A fragment was appended. Text deltas arrive as they stream.
    Content(ResponseContent),
    /// A progress entry was added or changed status.
    Progress(ProgressMessage),
    /// Authorship moved to another agent.
    AgentChanged { from: String, to: String },
    Completed,
    Failed(String),
}

/// Mutable response owned by a single chat request.
#[derive(Debug)]
pub struct ChatResponse {
    id: String,
    agent_id: String,
    reassigned: bool,
    content: Vec<ResponseContent>,
    progress: Vec<ProgressMessage>,
    state: ResponseState,
    events: broadcast::Sender<ResponseEvent>,
}

impl ChatResponse {
    /// Create an empty response authored by `agent_id`.
    pub fn new(agent_id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            reassigned: false,
            content: Vec::new(),
            progress: Vec::new(),
            state: ResponseState::Pending,
            events,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ResponseEvent> {
        self.events.subscribe()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The agent currently credited with this response.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn content(&self) -> &[ResponseContent] {
        &self.content
    }

    pub fn progress_messages(&self) -> &[ProgressMessage] {
        &self.progress
    }

    pub fn state(&self) -> &ResponseState {
        &self.state
    }

    /// Whether the response has been completed or failed.
    pub fn is_closed(&self) -> bool {
        self.state != ResponseState::Pending
    }

    /// Concatenated answer text, excluding informational notices.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ResponseContent::Text(text) => Some(text.as_str()),
                ResponseContent::Informational(_) => None,
            })
            .collect()
    }

    /// Append a content fragment.
    ///
    /// Consecutive text fragments are merged so streamed deltas form one block.
    pub fn add_content(&mut self, fragment: ResponseContent) -> Result<(), ResponseError> {
        self.ensure_open()?;

        match (&fragment, self.content.last_mut()) {
            (ResponseContent::Text(delta), Some(ResponseContent::Text(existing))) => {
                existing.push_str(delta);
            }
            _ => self.content.push(fragment.clone()),
        }
        self.publish(ResponseEvent::Content(fragment));
        Ok(())
    }

    /// Add a progress entry and return it.
    pub fn add_progress_message(
        &mut self,
        content: impl Into<String>,
        status: ProgressStatus,
    ) -> Result<ProgressMessage, ResponseError> {
        self.ensure_open()?;

        let message = ProgressMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            status,
        };
        self.progress.push(message.clone());
        self.publish(ResponseEvent::Progress(message.clone()));
        Ok(message)
    }

    /// Change the status of one progress entry.
    pub fn update_progress_message(
        &mut self,
        id: &str,
        status: ProgressStatus,
    ) -> Result<(), ResponseError> {
        self.ensure_open()?;

        let entry = self
            .progress
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ResponseError::UnknownProgress(id.to_string()))?;
        entry.status = status;
        let updated = entry.clone();
        self.publish(ResponseEvent::Progress(updated));
        Ok(())
    }

    /// Set every progress entry to `status`.
    pub fn mark_all_progress(&mut self, status: ProgressStatus) -> Result<(), ResponseError> {
        let ids: Vec<String> = self.progress.iter().map(|p| p.id.clone()).collect();
        for id in ids {
            self.update_progress_message(&id, status)?;
        }
        Ok(())
    }

    /// Set every entry still in progress to `status`.
    pub fn resolve_in_progress(&mut self, status: ProgressStatus) -> Result<(), ResponseError> {
        let ids: Vec<String> = self
            .progress
            .iter()
            .filter(|p| p.status == ProgressStatus::InProgress)
            .map(|p| p.id.clone())
            .collect();
        for id in ids {
            self.update_progress_message(&id, status)?;
        }
        Ok(())
    }

    /// Transfer authorship to another agent.
    ///
    /// Allowed once per request.
    pub fn override_agent_id(&mut self, agent_id: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_open()?;
        if self.reassigned {
            return Err(ResponseError::AgentAlreadyReassigned(self.agent_id.clone()));
        }

        let to = agent_id.into();
        let from = std::mem::replace(&mut self.agent_id, to.clone());
        self.reassigned = true;
        self.publish(ResponseEvent::AgentChanged { from, to });
        Ok(())
    }

    /// Mark the response complete and freeze it.
    pub fn complete(&mut self) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.state = ResponseState::Complete;
        self.publish(ResponseEvent::Completed);
        Ok(())
    }

    /// Mark the response failed and freeze it.
    ///
    /// Entries still in progress are marked failed first.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.resolve_in_progress(ProgressStatus::Failed)?;
        let reason = reason.into();
        self.state = ResponseState::Failed(reason.clone());
        self.publish(ResponseEvent::Failed(reason));
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        if self.is_closed() {
            Err(ResponseError::Closed)
        } else {
            Ok(())
        }
    }

    fn publish(&self, event: ResponseEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fragments_merge() {
        let mut response = ChatResponse::new("Universal");
        response.add_content(ResponseContent::Text("Hello".into())).unwrap();
        response.add_content(ResponseContent::Text(", world".into())).unwrap();
        response
            .add_content(ResponseContent::Informational("note".into()))
            .unwrap();
        response.add_content(ResponseContent::Text("!".into())).unwrap();

        assert_eq!(response.content().len(), 3);
        assert_eq!(response.content()[0].as_str(), "Hello, world");
        assert_eq!(response.text(), "Hello, world!");
    }

    #[test]
    fn test_agent_reassigned_once() {
        let mut response = ChatResponse::new("Orchestrator");
        response.override_agent_id("Coder").unwrap();
        assert_eq!(response.agent_id(), "Coder");

        let err = response.override_agent_id("Architect").unwrap_err();
        assert_eq!(err, ResponseError::AgentAlreadyReassigned("Coder".to_string()));
        assert_eq!(response.agent_id(), "Coder");
    }

    #[test]
    fn test_progress_updates() {
        let mut response = ChatResponse::new("Orchestrator");
        let first = response
            .add_progress_message("routing", ProgressStatus::InProgress)
            .unwrap();
        response
            .add_progress_message("done already", ProgressStatus::Completed)
            .unwrap();

        response.resolve_in_progress(ProgressStatus::Failed).unwrap();
        assert_eq!(response.progress_messages()[0].status, ProgressStatus::Failed);
        assert_eq!(response.progress_messages()[1].status, ProgressStatus::Completed);

        response.mark_all_progress(ProgressStatus::Completed).unwrap();
        assert!(response
            .progress_messages()
            .iter()
            .all(|p| p.status == ProgressStatus::Completed));

        response
            .update_progress_message(&first.id, ProgressStatus::InProgress)
            .unwrap();
        assert!(matches!(
            response.update_progress_message("missing", ProgressStatus::Failed),
            Err(ResponseError::UnknownProgress(_))
        ));
    }

    #[test]
    fn test_closed_after_complete() {
        let mut response = ChatResponse::new("Universal");
        response.add_content(ResponseContent::Text("answer".into())).unwrap();
        response.complete().unwrap();

        assert_eq!(response.state(), &ResponseState::Complete);
        assert_eq!(
            response.add_content(ResponseContent::Text("late".into())),
            Err(ResponseError::Closed)
        );
        assert_eq!(response.override_agent_id("Coder"), Err(ResponseError::Closed));
        assert_eq!(response.complete(), Err(ResponseError::Closed));
        assert_eq!(response.text(), "answer");
    }

    #[test]
    fn test_fail_resolves_progress() {
        let mut response = ChatResponse::new("Orchestrator");
        response
            .add_progress_message("routing", ProgressStatus::InProgress)
            .unwrap();
        response.fail("boom").unwrap();

        assert_eq!(response.state(), &ResponseState::Failed("boom".to_string()));
        assert_eq!(response.progress_messages()[0].status, ProgressStatus::Failed);
        assert!(response.fail("again").is_err());
    }

    #[tokio::test]
    async fn test_observers_see_events_in_order() {
        let mut response = ChatResponse::new("Orchestrator");
        let mut events = response.subscribe();

        let progress = response
            .add_progress_message("routing", ProgressStatus::InProgress)
            .unwrap();
        response.override_agent_id("Coder").unwrap();
        response.add_content(ResponseContent::Text("hi".into())).unwrap();
        response.complete().unwrap();

        assert_eq!(events.recv().await.unwrap(), ResponseEvent::Progress(progress));
        assert_eq!(
            events.recv().await.unwrap(),
            ResponseEvent::AgentChanged {
                from: "Orchestrator".into(),
                to: "Coder".into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ResponseEvent::Content(ResponseContent::Text("hi".into()))
        );
        assert_eq!(events.recv().await.unwrap(), ResponseEvent::Completed);
    }
}
