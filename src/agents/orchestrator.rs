// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The routing agent.
//!
//! The orchestrator never answers a request itself. It shows the routing
//! model the current list of agents, asks for a ranked JSON array of agent
//! ids, and hands the request to the first usable one:
//!
//! 1. the first candidate, if it is registered
//! 2. the fallback agent (`Universal` by default) if the model produced no
//!    usable candidate
//! 3. the first other registered agent if the chosen id is unknown
//!
//! Each routing exchange is recorded under a fresh [`CorrelationId`], which
//! is also left in [`RequestContext::routing_id`](crate::chat::RequestContext).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Arc, Weak};
use tracing::{error, info, warn, Instrument};

use crate::chat::{cancelled, ChatRequest, ProgressStatus, ResponseContent};
use crate::error::DispatchError;
use crate::gateway::{LanguageModelGateway, AGENT_SELECTION_PURPOSE};
use crate::prompts::{ChatAgentsVariable, PromptService, VariableResolver, ORCHESTRATOR_TEMPLATE_ID};
use crate::recording::{RequestRecord, ResponseRecord, SharedRecorder};
use crate::telemetry::{CorrelationId, RoutingOutcome, RoutingSpan};

use super::{AgentRegistry, ChatAgent, SharedAgent, ORCHESTRATOR_AGENT_ID, UNIVERSAL_AGENT_ID};

const ROUTING_PROGRESS: &str = "Determining the most appropriate agent";

const DESCRIPTION: &str = "This agent compares the user's request with the descriptions of all \
    available chat agents and picks the best fit using a language model. The request is then \
    delegated to that agent without further confirmation.";

/// Extract ranked agent ids from a routing model reply.
///
/// Accepts a bare JSON array or one inside a markdown code fence, which may
/// be preceded by prose.
/// Elements that are not strings are skipped. Valid JSON that is not an array
/// yields no candidates.
pub fn parse_candidates(text: &str) -> Result<Vec<String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(id) => Some(id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[^\S\n]*\n?(.*?)```").expect("valid regex"));

/// Body of the first fenced block, or the whole text when there is none.
fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Agent that delegates each request to the best matching agent.
pub struct OrchestratorAgent {
    gateway: Arc<LanguageModelGateway>,
    prompts: Arc<PromptService>,
    registry: Weak<AgentRegistry>,
    chat_agents: Arc<dyn VariableResolver>,
    recorder: SharedRecorder,
    fallback_agent_id: String,
}

impl OrchestratorAgent {
    pub fn new(
        gateway: Arc<LanguageModelGateway>,
        prompts: Arc<PromptService>,
        registry: Weak<AgentRegistry>,
        recorder: SharedRecorder,
    ) -> Self {
        Self {
            gateway,
            prompts,
            chat_agents: Arc::new(ChatAgentsVariable::new(registry.clone())),
            registry,
            recorder,
            fallback_agent_id: UNIVERSAL_AGENT_ID.to_string(),
        }
    }

    /// Agent used when the model names no usable candidate.
    pub fn with_fallback(mut self, agent_id: impl Into<String>) -> Self {
        self.fallback_agent_id = agent_id.into();
        self
    }

    pub fn fallback_agent_id(&self) -> &str {
        &self.fallback_agent_id
    }

    /// Ask the routing model and return its raw reply.
    ///
    /// `Ok(None)` means the request was cancelled while waiting.
    async fn select(
        &self,
        request: &mut ChatRequest,
        span: &RoutingSpan,
    ) -> Result<Option<String>, DispatchError> {
        let correlation_id = CorrelationId::new();
        request.context.routing_id = Some(correlation_id);
        span.record_correlation_id(&correlation_id);

        let mut messages = request.session().messages().await;
        messages.push(request.user_message());
        let system_prompt = self
            .prompts
            .get_prompt_with(ORCHESTRATOR_TEMPLATE_ID, &[self.chat_agents.clone()])
            .await;
        let session_id = request.session().id().to_string();

        self.recorder.record_request(RequestRecord::new(
            self.id(),
            session_id.clone(),
            correlation_id,
            messages.clone(),
            system_prompt.clone(),
        ));

        let reply = tokio::select! {
            biased;
            _ = cancelled(request.cancel_signal()) => return Ok(None),
            result = self.gateway.send(
                AGENT_SELECTION_PURPOSE,
                &messages,
                system_prompt.as_deref(),
                None,
            ) => result,
        };

        let text = match reply {
            Ok(response) => response.content,
            Err(e) => {
                error!(error = %e, "Agent selection request failed");
                String::new()
            }
        };

        self.recorder.record_response(ResponseRecord::new(
            self.id(),
            session_id,
            correlation_id,
            text.clone(),
        ));
        Ok(Some(text))
    }

    /// Pick the delegate and commit it to the response.
    async fn route(
        &self,
        request: &mut ChatRequest,
        span: &RoutingSpan,
    ) -> Result<(SharedAgent, RoutingOutcome), DispatchError> {
        request
            .response_mut()
            .add_progress_message(ROUTING_PROGRESS, ProgressStatus::InProgress)?;

        let Some(text) = self.select(request, span).await? else {
            return self.abort(request, DispatchError::Cancelled);
        };

        let candidates: Vec<String> = match parse_candidates(&text) {
            Ok(ids) => ids.into_iter().filter(|id| id != self.id()).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to parse agent selection");
                Vec::new()
            }
        };

        let (mut agent_id, mut outcome) = match candidates.into_iter().next() {
            Some(id) => (id, RoutingOutcome::Direct),
            None => {
                warn!(fallback = %self.fallback_agent_id, "No agent was selected, delegating to fallback agent");
                request.response_mut().mark_all_progress(ProgressStatus::Failed)?;
                (self.fallback_agent_id.clone(), RoutingOutcome::Fallback)
            }
        };

        let Some(registry) = self.registry.upgrade() else {
            return self.abort(request, DispatchError::NoAgentAvailable);
        };

        let known = agent_id != self.id() && registry.get_agent(&agent_id).await.is_some();
        if !known {
            warn!(agent = %agent_id, "Chat agent not found, falling back to first registered agent");
            let first = registry
                .get_agents()
                .await
                .into_iter()
                .find(|a| a.id() != self.id());
            match first {
                Some(agent) => {
                    agent_id = agent.id().to_string();
                    outcome = RoutingOutcome::FirstAvailable;
                }
                None => return self.abort(request, DispatchError::NoAgentAvailable),
            }
        }

        if request.is_cancelled() {
            return self.abort(request, DispatchError::Cancelled);
        }

        let response = request.response_mut();
        response.add_content(ResponseContent::Informational(format!(
            "*{}*: Delegating to `@{}`\n\n---\n\n",
            self.id(),
            agent_id
        )))?;
        response.override_agent_id(agent_id.clone())?;
        response.mark_all_progress(ProgressStatus::Completed)?;

        let agent = registry
            .get_agent(&agent_id)
            .await
            .ok_or_else(|| DispatchError::AgentNotFound(agent_id.clone()))?;

        span.record_delegate(&agent_id);
        info!(agent = %agent_id, %outcome, "Delegating request");
        Ok((agent, outcome))
    }

    fn abort<T>(&self, request: &mut ChatRequest, err: DispatchError) -> Result<T, DispatchError> {
        request
            .response_mut()
            .resolve_in_progress(ProgressStatus::Failed)?;
        Err(err)
    }
}

#[async_trait]
impl ChatAgent for OrchestratorAgent {
    fn id(&self) -> &str {
        ORCHESTRATOR_AGENT_ID
    }

    fn name(&self) -> &str {
        ORCHESTRATOR_AGENT_ID
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
        let span = RoutingSpan::start(request.session().id());
        let routed = self
            .route(request, &span)
            .instrument(span.span().clone())
            .await;

        match routed {
            Ok((agent, outcome)) => {
                span.finish(outcome);
                agent.invoke(request).await
            }
            Err(e) => {
                let outcome = match e {
                    DispatchError::Cancelled => RoutingOutcome::Cancelled,
                    _ => RoutingOutcome::Failed,
                };
                span.finish(outcome);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatSession;
    use crate::error::ProviderError;
    use crate::recording::{InMemoryRecorder, MockRecordingService};
    use crate::types::{LanguageModel, Message, ModelResponse, StreamCallback};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;

    /// Replies with a fixed text, optionally after a delay or with an error.
    struct ScriptedModel {
        reply: Result<String, ProviderError>,
        delay: Duration,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn chat(
            &self,
            _messages: &[Message],
            _system_prompt: Option<&str>,
        ) -> Result<ModelResponse, ProviderError> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map(ModelResponse::text)
        }

        async fn stream_chat(
            &self,
            messages: &[Message],
            system_prompt: Option<&str>,
            _on_event: StreamCallback,
        ) -> Result<ModelResponse, ProviderError> {
            self.chat(messages, system_prompt).await
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn model(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Counts invocations and writes its id into the response.
    struct CountingAgent {
        id: &'static str,
        calls: AtomicUsize,
    }

    impl CountingAgent {
        fn new(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatAgent for CountingAgent {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn description(&self) -> &str {
            "counts"
        }

        async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            request
                .response_mut()
                .add_content(ResponseContent::Text(format!("answer from {}", self.id)))?;
            Ok(())
        }
    }

    struct Fixture {
        registry: Arc<AgentRegistry>,
        orchestrator: Arc<OrchestratorAgent>,
    }

    async fn fixture(model: Arc<ScriptedModel>, recorder: SharedRecorder, agents: &[Arc<CountingAgent>]) -> Fixture {
        let gateway = Arc::new(LanguageModelGateway::new());
        gateway.register_model("router", model).await;
        gateway.set_default_model("router").await;
        let prompts = Arc::new(PromptService::with_builtins().await);
        let registry = Arc::new(AgentRegistry::new());

        let orchestrator = Arc::new(OrchestratorAgent::new(
            gateway,
            prompts,
            Arc::downgrade(&registry),
            recorder,
        ));
        registry.register(orchestrator.clone()).await.unwrap();
        for agent in agents {
            registry.register(agent.clone()).await.unwrap();
        }
        Fixture { registry, orchestrator }
    }

    fn request() -> ChatRequest {
        ChatRequest::new(Arc::new(ChatSession::with_id("s1")), "help me", ORCHESTRATOR_AGENT_ID)
    }

    #[test]
    fn test_parse_candidates() {
        assert_eq!(parse_candidates(r#"["Coder","Architect"]"#).unwrap(), vec!["Coder", "Architect"]);
        assert_eq!(
            parse_candidates("```json\n[\"Coder\"]\n```").unwrap(),
            vec!["Coder"]
        );
        assert_eq!(parse_candidates("```\n[\"Coder\"]\n```").unwrap(), vec!["Coder"]);
        assert_eq!(
            parse_candidates("The best fit is the coder agent:\n```json\n[\"Coder\"]\n```").unwrap(),
            vec!["Coder"]
        );
        assert_eq!(
            parse_candidates("Ranked:\n```json\n[\"Coder\", \"Universal\"]\n```\nCoder writes code.")
                .unwrap(),
            vec!["Coder", "Universal"]
        );
        assert_eq!(parse_candidates("```[\"Coder\"]```").unwrap(), vec!["Coder"]);
        assert_eq!(parse_candidates(r#"[1, "Coder", null]"#).unwrap(), vec!["Coder"]);
        assert!(parse_candidates(r#"{"agent":"Coder"}"#).unwrap().is_empty());
        assert!(parse_candidates("not json").is_err());
        assert!(parse_candidates("").is_err());
    }

    #[tokio::test]
    async fn test_delegates_to_first_candidate() {
        let coder = CountingAgent::new("Coder");
        let architect = CountingAgent::new("Architect");
        let recorder = Arc::new(InMemoryRecorder::new());
        let f = fixture(
            ScriptedModel::replying(r#"["Orchestrator", "Architect", "Coder"]"#),
            recorder.clone(),
            &[coder.clone(), architect.clone()],
        )
        .await;

        let mut request = request();
        f.orchestrator.invoke(&mut request).await.unwrap();

        assert_eq!(architect.calls(), 1);
        assert_eq!(coder.calls(), 0);
        let response = request.response();
        assert_eq!(response.agent_id(), "Architect");
        assert_eq!(
            response.content()[0],
            ResponseContent::Informational("*Orchestrator*: Delegating to `@Architect`\n\n---\n\n".into())
        );
        assert_eq!(response.text(), "answer from Architect");
        assert!(response
            .progress_messages()
            .iter()
            .all(|p| p.status == ProgressStatus::Completed));

        let routing_id = request.context.routing_id.unwrap();
        let interaction = recorder.interaction(&routing_id).unwrap();
        assert_eq!(interaction.request.agent_id, ORCHESTRATOR_AGENT_ID);
        assert_eq!(interaction.request.session_id, "s1");
        assert_eq!(interaction.request.messages.last().unwrap().content, "help me");
        assert!(interaction
            .request
            .system_prompt
            .unwrap()
            .contains("ID: Architect"));
        assert_eq!(interaction.response.unwrap().response, r#"["Orchestrator", "Architect", "Coder"]"#);
    }

    #[tokio::test]
    async fn test_prose_before_fence_still_routes() {
        let coder = CountingAgent::new("Coder");
        let universal = CountingAgent::new("Universal");
        let f = fixture(
            ScriptedModel::replying("The best fit is the coder agent:\n```json\n[\"Coder\"]\n```"),
            Arc::new(InMemoryRecorder::new()),
            &[universal.clone(), coder.clone()],
        )
        .await;

        let mut request = request();
        f.orchestrator.invoke(&mut request).await.unwrap();
        assert_eq!(coder.calls(), 1);
        assert_eq!(universal.calls(), 0);
    }

    #[tokio::test]
    async fn test_routing_prompt_reads_registry_at_call_time() {
        let coder = CountingAgent::new("Coder");
        let recorder = Arc::new(InMemoryRecorder::new());
        let f = fixture(ScriptedModel::replying(r#"["Coder"]"#), recorder.clone(), &[coder]).await;

        let mut first = request();
        f.orchestrator.invoke(&mut first).await.unwrap();
        f.registry.register(CountingAgent::new("Late")).await.unwrap();
        let mut second = request();
        f.orchestrator.invoke(&mut second).await.unwrap();

        let prompts: Vec<String> = recorder
            .requests()
            .into_iter()
            .map(|r| r.system_prompt.unwrap_or_default())
            .collect();
        assert!(prompts.iter().all(|p| !p.contains("{{chatAgents}}")));
        assert!(prompts[0].contains("ID: Coder"));
        assert!(!prompts[0].contains("ID: Late"));
        assert!(prompts[1].contains("ID: Late"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_uses_fallback() {
        let universal = CountingAgent::new("Universal");
        let coder = CountingAgent::new("Coder");
        let f = fixture(
            ScriptedModel::replying("I think Coder fits best."),
            Arc::new(InMemoryRecorder::new()),
            &[coder.clone(), universal.clone()],
        )
        .await;

        let mut request = request();
        let mut events = request.response().subscribe();
        f.orchestrator.invoke(&mut request).await.unwrap();

        assert_eq!(universal.calls(), 1);
        assert_eq!(coder.calls(), 0);
        assert_eq!(request.response().agent_id(), "Universal");

        // Progress goes in-progress, failed, then completed.
        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let crate::chat::ResponseEvent::Progress(p) = event {
                statuses.push(p.status);
            }
        }
        assert_eq!(
            statuses,
            vec![ProgressStatus::InProgress, ProgressStatus::Failed, ProgressStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_configured_fallback() {
        let coder = CountingAgent::new("Coder");
        let architect = CountingAgent::new("Architect");
        let gateway = Arc::new(LanguageModelGateway::new());
        gateway.register_model("router", ScriptedModel::replying("[]")).await;
        gateway.set_default_model("router").await;
        let registry = Arc::new(AgentRegistry::new());
        let orchestrator = OrchestratorAgent::new(
            gateway,
            Arc::new(PromptService::with_builtins().await),
            Arc::downgrade(&registry),
            Arc::new(InMemoryRecorder::new()),
        )
        .with_fallback("Architect");
        registry.register(coder.clone()).await.unwrap();
        registry.register(architect.clone()).await.unwrap();

        let mut request = request();
        orchestrator.invoke(&mut request).await.unwrap();
        assert_eq!(orchestrator.fallback_agent_id(), "Architect");
        assert_eq!(architect.calls(), 1);
        assert_eq!(coder.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_candidate_uses_first_registered() {
        let a = CountingAgent::new("A");
        let b = CountingAgent::new("B");
        let f = fixture(
            ScriptedModel::replying(r#"["C", "B"]"#),
            Arc::new(InMemoryRecorder::new()),
            &[a.clone(), b.clone()],
        )
        .await;

        let mut request = request();
        f.orchestrator.invoke(&mut request).await.unwrap();
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert_eq!(request.response().agent_id(), "A");
    }

    #[tokio::test]
    async fn test_no_other_agent_is_fatal() {
        let f = fixture(
            ScriptedModel::replying(r#"["Coder"]"#),
            Arc::new(InMemoryRecorder::new()),
            &[],
        )
        .await;

        let mut request = request();
        let err = f.orchestrator.invoke(&mut request).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoAgentAvailable));
        assert_eq!(
            err.to_string(),
            "No chat agent available to handle request. Please check your configuration whether any are enabled."
        );
        assert_eq!(request.response().agent_id(), ORCHESTRATOR_AGENT_ID);
        assert!(request.response().content().is_empty());
        assert!(request
            .response()
            .progress_messages()
            .iter()
            .all(|p| p.status == ProgressStatus::Failed));
        assert_eq!(f.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_gateway_error_routes_to_fallback() {
        let universal = CountingAgent::new("Universal");
        let model = Arc::new(ScriptedModel {
            reply: Err(ProviderError::RateLimited("slow down".into())),
            delay: Duration::ZERO,
        });
        let recorder = Arc::new(InMemoryRecorder::new());
        let f = fixture(model, recorder.clone(), &[universal.clone()]).await;

        let mut request = request();
        f.orchestrator.invoke(&mut request).await.unwrap();
        assert_eq!(universal.calls(), 1);
        assert_eq!(recorder.responses()[0].response, "");
    }

    #[tokio::test]
    async fn test_records_exactly_once_with_shared_id() {
        let captured: Arc<Mutex<Vec<CorrelationId>>> = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = MockRecordingService::new();

        let sink = captured.clone();
        recorder
            .expect_record_request()
            .times(1)
            .returning(move |record| sink.lock().unwrap().push(record.correlation_id));
        let sink = captured.clone();
        recorder
            .expect_record_response()
            .times(1)
            .returning(move |record| sink.lock().unwrap().push(record.correlation_id));

        let coder = CountingAgent::new("Coder");
        let f = fixture(ScriptedModel::replying(r#"["Coder"]"#), Arc::new(recorder), &[coder]).await;

        let mut request = request();
        f.orchestrator.invoke(&mut request).await.unwrap();

        let ids = captured.lock().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(Some(ids[0]), request.context.routing_id);
    }

    #[tokio::test]
    async fn test_each_request_gets_fresh_correlation_id() {
        let coder = CountingAgent::new("Coder");
        let recorder = Arc::new(InMemoryRecorder::new());
        let f = fixture(ScriptedModel::replying(r#"["Coder"]"#), recorder.clone(), &[coder.clone()]).await;

        let mut first = request();
        let mut second = request();
        f.orchestrator.invoke(&mut first).await.unwrap();
        f.orchestrator.invoke(&mut second).await.unwrap();

        assert_ne!(first.context.routing_id, second.context.routing_id);
        assert_eq!(recorder.requests().len(), 2);
        assert_eq!(coder.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_selection() {
        let coder = CountingAgent::new("Coder");
        let model = Arc::new(ScriptedModel {
            reply: Ok(r#"["Coder"]"#.to_string()),
            delay: Duration::from_secs(5),
        });
        let recorder = Arc::new(InMemoryRecorder::new());
        let f = fixture(model, recorder.clone(), &[coder.clone()]).await;

        let (tx, rx) = watch::channel(false);
        let mut request =
            ChatRequest::with_cancel(Arc::new(ChatSession::new()), "help", ORCHESTRATOR_AGENT_ID, rx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(true);
        });

        let err = tokio::time::timeout(Duration::from_secs(1), f.orchestrator.invoke(&mut request))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(coder.calls(), 0);
        assert_eq!(
            request.response().progress_messages()[0].status,
            ProgressStatus::Failed
        );
        assert!(recorder.responses().is_empty());
    }
}
