// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Generic agent that streams a language model answer into the response.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::chat::{cancelled, ChatRequest, ResponseContent};
use crate::error::DispatchError;
use crate::gateway::LanguageModelGateway;
use crate::prompts::PromptService;
use crate::types::{StreamCallback, StreamEvent};

use super::ChatAgent;

/// An agent defined by a system prompt and a model purpose.
pub struct LanguageModelAgent {
    id: String,
    description: String,
    purpose: String,
    template_id: String,
    gateway: Arc<LanguageModelGateway>,
    prompts: Arc<PromptService>,
}

impl LanguageModelAgent {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        purpose: impl Into<String>,
        template_id: impl Into<String>,
        gateway: Arc<LanguageModelGateway>,
        prompts: Arc<PromptService>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            purpose: purpose.into(),
            template_id: template_id.into(),
            gateway,
            prompts,
        }
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

#[async_trait]
impl ChatAgent for LanguageModelAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
        if request.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let system_prompt = self.prompts.get_prompt(&self.template_id).await;
        let mut messages = request.session().messages().await;
        messages.push(request.user_message());

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let on_event: StreamCallback = Box::new(move |event| {
            if let StreamEvent::TextDelta(text) = event {
                let _ = tx.send(text);
            }
        });

        debug!(agent = %self.id, purpose = %self.purpose, "Invoking language model");
        let send = self
            .gateway
            .send(&self.purpose, &messages, system_prompt.as_deref(), Some(on_event));
        tokio::pin!(send);
        let cancel = cancelled(request.cancel_signal());
        tokio::pin!(cancel);

        let mut streamed = false;
        let result = loop {
            tokio::select! {
                biased;
                _ = &mut cancel => return Err(DispatchError::Cancelled),
                Some(delta) = rx.recv() => {
                    streamed = true;
                    request.response_mut().add_content(ResponseContent::Text(delta))?;
                }
                result = &mut send => break result,
            }
        };

        while let Ok(delta) = rx.try_recv() {
            streamed = true;
            request.response_mut().add_content(ResponseContent::Text(delta))?;
        }

        let response = result?;
        if !streamed && !response.content.is_empty() {
            request
                .response_mut()
                .add_content(ResponseContent::Text(response.content))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatSession;
    use crate::error::ProviderError;
    use crate::gateway::CHAT_PURPOSE;
    use crate::prompts::PromptTemplate;
    use crate::types::{LanguageModel, Message, ModelResponse, Role};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;

    /// Streams fixed chunks and remembers what it was sent.
    struct ChunkModel {
        chunks: Vec<&'static str>,
        delay: Duration,
        seen: Mutex<Vec<(Vec<Message>, Option<String>)>>,
    }

    impl ChunkModel {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ChunkModel {
        async fn chat(
            &self,
            messages: &[Message],
            system_prompt: Option<&str>,
        ) -> Result<ModelResponse, ProviderError> {
            self.stream_chat(messages, system_prompt, Box::new(|_| {})).await
        }

        async fn stream_chat(
            &self,
            messages: &[Message],
            system_prompt: Option<&str>,
            on_event: StreamCallback,
        ) -> Result<ModelResponse, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), system_prompt.map(String::from)));
            tokio::time::sleep(self.delay).await;
            for chunk in &self.chunks {
                on_event(StreamEvent::TextDelta(chunk.to_string()));
            }
            Ok(ModelResponse::text(self.chunks.concat()))
        }

        fn name(&self) -> &str {
            "Chunks"
        }

        fn model(&self) -> String {
            "chunks".to_string()
        }
    }

    async fn agent_with(model: Arc<ChunkModel>) -> LanguageModelAgent {
        let gateway = Arc::new(LanguageModelGateway::new());
        gateway.register_model("chunks", model).await;
        gateway.set_default_model("chunks").await;

        let prompts = Arc::new(PromptService::new());
        prompts
            .store_template(PromptTemplate::new("test-system", "Be brief."))
            .await;

        LanguageModelAgent::new("Coder", "codes", CHAT_PURPOSE, "test-system", gateway, prompts)
    }

    #[tokio::test]
    async fn test_streams_into_single_text_fragment() {
        let model = Arc::new(ChunkModel::new(vec!["Use ", "`Arc`", "."]));
        let agent = agent_with(model.clone()).await;

        let session = Arc::new(ChatSession::new());
        session
            .append_exchange(Message::user("earlier"), Message::assistant("reply"))
            .await;
        let mut request = ChatRequest::new(session, "share state?", "Coder");
        agent.invoke(&mut request).await.unwrap();

        assert_eq!(request.response().text(), "Use `Arc`.");
        assert_eq!(request.response().content().len(), 1);

        let seen = model.seen.lock().unwrap();
        let (messages, system) = &seen[0];
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content, "share state?");
        assert_eq!(system.as_deref(), Some("Be brief."));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let gateway = Arc::new(LanguageModelGateway::new());
        let agent = LanguageModelAgent::new(
            "Universal",
            "all",
            CHAT_PURPOSE,
            "none",
            gateway,
            Arc::new(PromptService::new()),
        );

        let mut request = ChatRequest::new(Arc::new(ChatSession::new()), "hi", "Universal");
        let err = agent.invoke(&mut request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Model(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_cancel_while_streaming() {
        let mut model = ChunkModel::new(vec!["late"]);
        model.delay = Duration::from_secs(5);
        let agent = agent_with(Arc::new(model)).await;

        let (tx, rx) = watch::channel(false);
        let mut request = ChatRequest::with_cancel(Arc::new(ChatSession::new()), "hi", "Coder", rx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(true);
        });

        let err = tokio::time::timeout(Duration::from_secs(1), agent.invoke(&mut request))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(request.response().text(), "");
    }
}
