// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chat service: runs user turns through the agent registry.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::agents::AgentRegistry;
use crate::chat::{ChatRequest, ChatResponse, ChatSession, ResponseEvent};
use crate::error::DispatchError;
use crate::types::Message;

/// Split a leading `@AgentId` mention from the message.
pub fn parse_agent_mention(text: &str) -> (Option<&str>, &str) {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix('@') else {
        return (None, text);
    };
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    if end == 0 {
        return (None, text);
    }
    (Some(&rest[..end]), rest[end..].trim_start())
}

/// A request running in the background.
pub struct ChatRequestHandle {
    request_id: String,
    events: broadcast::Receiver<ResponseEvent>,
    skipped: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<ChatResponse>,
}

impl ChatRequestHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Response events, starting with the first change.
    pub fn events(&mut self) -> &mut broadcast::Receiver<ResponseEvent> {
        &mut self.events
    }

    /// Next response event, or `None` once every sender is dropped.
    ///
    /// Events dropped because this receiver fell behind are counted in
    /// [`skipped_events`](Self::skipped_events); the finished response from
    /// [`wait`](Self::wait) still holds everything.
    pub async fn next_event(&mut self) -> Option<ResponseEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(request = %self.request_id, skipped, "Response observer fell behind");
                    self.skipped += skipped;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn skipped_events(&self) -> u64 {
        self.skipped
    }

    /// Ask the running request to stop.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the finished response.
    pub async fn wait(self) -> crate::error::Result<ChatResponse> {
        Ok(self.task.await?)
    }
}

/// Entry point for sending chat requests.
pub struct ChatService {
    registry: Arc<AgentRegistry>,
    default_agent_id: String,
}

impl ChatService {
    pub fn new(registry: Arc<AgentRegistry>, default_agent_id: impl Into<String>) -> Self {
        Self {
            registry,
            default_agent_id: default_agent_id.into(),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn default_agent_id(&self) -> &str {
        &self.default_agent_id
    }

    pub fn create_session(&self) -> Arc<ChatSession> {
        Arc::new(ChatSession::new())
    }

    /// Start processing `text` in `session`.
    ///
    /// A leading `@AgentId` naming a registered agent bypasses the default
    /// agent and is removed from the message.
    pub async fn send_request(&self, session: Arc<ChatSession>, text: &str) -> ChatRequestHandle {
        let (mention, rest) = parse_agent_mention(text);
        let explicit = match mention {
            Some(id) => self.registry.get_agent(id).await.map(|_| id),
            None => None,
        };
        let (agent_id, message) = match explicit {
            Some(id) => (id.to_string(), rest.to_string()),
            None => (self.default_agent_id.clone(), text.to_string()),
        };

        let (cancel, cancel_rx) = watch::channel(false);
        let request = ChatRequest::with_cancel(session, message, &agent_id, cancel_rx);
        let request_id = request.id().to_string();
        let events = request.response().subscribe();

        debug!(request = %request_id, agent = %agent_id, "Starting chat request");
        let registry = self.registry.clone();
        let task = tokio::spawn(run_request(registry, agent_id, request));

        ChatRequestHandle {
            request_id,
            events,
            skipped: 0,
            cancel,
            task,
        }
    }
}

async fn run_request(
    registry: Arc<AgentRegistry>,
    agent_id: String,
    mut request: ChatRequest,
) -> ChatResponse {
    let result = match registry.get_agent(&agent_id).await {
        Some(agent) => agent.invoke(&mut request).await,
        None => Err(DispatchError::AgentNotFound(agent_id)),
    };

    match result {
        Ok(()) => {
            let answer = request.response().text();
            if let Err(e) = request.response_mut().complete() {
                warn!(error = %e, "Could not complete response");
            }
            request
                .session()
                .append_exchange(request.user_message(), Message::assistant(answer))
                .await;
        }
        Err(e) => {
            warn!(request = %request.id(), error = %e, "Chat request failed");
            if let Err(close) = request.response_mut().fail(e.to_string()) {
                warn!(error = %close, "Could not fail response");
            }
        }
    }
    request.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ChatAgent;
    use crate::chat::{ResponseContent, ResponseState};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoAgent(&'static str);

    #[async_trait]
    impl ChatAgent for EchoAgent {
        fn id(&self) -> &str {
            self.0
        }

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
            let text = format!("{}: {}", self.0, request.message());
            request.response_mut().add_content(ResponseContent::Text(text))?;
            Ok(())
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl ChatAgent for SlowAgent {
        fn id(&self) -> &str {
            "Slow"
        }

        fn name(&self) -> &str {
            "Slow"
        }

        fn description(&self) -> &str {
            "waits for cancellation"
        }

        async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
            crate::chat::cancelled(request.cancel_signal()).await;
            Err(DispatchError::Cancelled)
        }
    }

    /// Writes its answer in many small pieces.
    struct ChattyAgent;

    #[async_trait]
    impl ChatAgent for ChattyAgent {
        fn id(&self) -> &str {
            "Chatty"
        }

        fn name(&self) -> &str {
            "Chatty"
        }

        fn description(&self) -> &str {
            "talks a lot"
        }

        async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
            for i in 0..600 {
                request
                    .response_mut()
                    .add_content(ResponseContent::Text(format!("{} ", i)))?;
            }
            Ok(())
        }
    }

    async fn service() -> ChatService {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(Arc::new(EchoAgent("Universal"))).await.unwrap();
        registry.register(Arc::new(ChattyAgent)).await.unwrap();
        registry.register(Arc::new(EchoAgent("Coder"))).await.unwrap();
        registry.register(Arc::new(SlowAgent)).await.unwrap();
        ChatService::new(registry, "Universal")
    }

    #[test]
    fn test_parse_agent_mention() {
        assert_eq!(parse_agent_mention("@Coder fix it"), (Some("Coder"), "fix it"));
        assert_eq!(parse_agent_mention("  @Coder"), (Some("Coder"), ""));
        assert_eq!(parse_agent_mention("email a@b.c"), (None, "email a@b.c"));
        assert_eq!(parse_agent_mention("@ nothing"), (None, "@ nothing"));
    }

    #[tokio::test]
    async fn test_default_agent_and_history() {
        let service = service().await;
        let session = service.create_session();

        let handle = service.send_request(session.clone(), "hello").await;
        let response = handle.wait().await.unwrap();

        assert_eq!(response.state(), &ResponseState::Complete);
        assert_eq!(response.text(), "Universal: hello");

        let history = session.messages().await;
        assert_eq!(history, vec![Message::user("hello"), Message::assistant("Universal: hello")]);
    }

    #[tokio::test]
    async fn test_mention_selects_agent() {
        let service = service().await;
        let response = service
            .send_request(service.create_session(), "@Coder fix it")
            .await
            .wait()
            .await
            .unwrap();
        assert_eq!(response.agent_id(), "Coder");
        assert_eq!(response.text(), "Coder: fix it");

        let response = service
            .send_request(service.create_session(), "@Nobody hi")
            .await
            .wait()
            .await
            .unwrap();
        assert_eq!(response.text(), "Universal: @Nobody hi");
    }

    #[tokio::test]
    async fn test_missing_default_agent_fails_response() {
        let service = ChatService::new(Arc::new(AgentRegistry::new()), "Orchestrator");
        let session = service.create_session();
        let response = service.send_request(session.clone(), "hi").await.wait().await.unwrap();

        assert_eq!(
            response.state(),
            &ResponseState::Failed("Chat agent Orchestrator not found.".to_string())
        );
        assert_eq!(session.len().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_fails_response() {
        let service = service().await;
        let handle = service.send_request(service.create_session(), "@Slow wait").await;
        handle.cancel();

        let ChatRequestHandle {
            mut events, task, ..
        } = handle;
        let response = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(response.state(), ResponseState::Failed(_)));
        assert!(matches!(events.try_recv(), Ok(ResponseEvent::Failed(_))));
    }

    #[tokio::test]
    async fn test_slow_observer_counts_skipped_events() {
        let service = service().await;
        let mut handle = service.send_request(service.create_session(), "@Chatty go").await;

        // Let the request run to completion before reading anything.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut seen = Vec::new();
        while let Some(event) = handle.next_event().await {
            let done = matches!(event, ResponseEvent::Completed);
            seen.push(event);
            if done {
                break;
            }
        }
        assert!(handle.skipped_events() > 0);
        assert!(matches!(seen.last(), Some(ResponseEvent::Completed)));

        let expected: String = (0..600).map(|i| format!("{} ", i)).collect();
        let response = handle.wait().await.unwrap();
        assert_eq!(response.text(), expected);
    }

    #[tokio::test]
    async fn test_next_event_in_order_without_skips() {
        let service = service().await;
        let mut handle = service.send_request(service.create_session(), "hi").await;

        let mut text = String::new();
        while let Some(event) = handle.next_event().await {
            match event {
                ResponseEvent::Content(ResponseContent::Text(delta)) => text.push_str(&delta),
                ResponseEvent::Completed => break,
                ResponseEvent::Failed(reason) => panic!("failed: {}", reason),
                _ => {}
            }
        }
        assert_eq!(text, "Universal: hi");
        assert_eq!(handle.skipped_events(), 0);
    }
}
