// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chat agents.
//!
//! An agent receives a [`ChatRequest`] by `&mut` and writes its answer into
//! the request's response. Agents are registered in an [`AgentRegistry`] and
//! selected by id, either explicitly by the user or by the
//! [`OrchestratorAgent`], which asks a language model which agent fits best
//! and then delegates.
//!
//! # Built-in agents
//!
//! | Id | Role |
//! |----|------|
//! | `Orchestrator` | Routes each request to the best agent |
//! | `Universal` | General programming questions, fallback |
//! | `Coder` | Code changes and code-centric questions |
//! | `Architect` | Design and architecture questions |

mod model_agent;
mod orchestrator;
mod registry;

pub use model_agent::LanguageModelAgent;
pub use orchestrator::{parse_candidates, OrchestratorAgent};
pub use registry::{AgentRegistry, AgentSettings};

use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::chat::ChatRequest;
use crate::error::DispatchError;
use crate::gateway::{LanguageModelGateway, CHAT_PURPOSE};
use crate::prompts::{
    PromptService, ARCHITECT_TEMPLATE_ID, CODER_TEMPLATE_ID, UNIVERSAL_TEMPLATE_ID,
};
use crate::recording::SharedRecorder;

pub const ORCHESTRATOR_AGENT_ID: &str = "Orchestrator";
pub const UNIVERSAL_AGENT_ID: &str = "Universal";
pub const CODER_AGENT_ID: &str = "Coder";
pub const ARCHITECT_AGENT_ID: &str = "Architect";

/// Something that can answer a chat request.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Unique id used for lookup and `@mentions`.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Free-text description shown to the routing model.
    fn description(&self) -> &str;

    /// Handle the request, writing into `request.response_mut()`.
    async fn invoke(&self, request: &mut ChatRequest) -> Result<(), DispatchError>;
}

/// Shared agent handle.
pub type SharedAgent = Arc<dyn ChatAgent>;

/// Build the built-in agents in registration order.
///
/// The orchestrator reads `registry` when routing, so it must be the
/// registry the agents end up in.
pub fn default_agents(
    gateway: Arc<LanguageModelGateway>,
    prompts: Arc<PromptService>,
    recorder: SharedRecorder,
    registry: Weak<AgentRegistry>,
    fallback_agent_id: &str,
) -> Vec<SharedAgent> {
    vec![
        Arc::new(
            OrchestratorAgent::new(gateway.clone(), prompts.clone(), registry, recorder)
                .with_fallback(fallback_agent_id),
        ),
        Arc::new(LanguageModelAgent::new(
            UNIVERSAL_AGENT_ID,
            "This agent helps developers with concise, accurate answers to general programming \
             and software development questions. It is also the fallback for any generic question. \
             It has no access to the user's workspace.",
            CHAT_PURPOSE,
            UNIVERSAL_TEMPLATE_ID,
            gateway.clone(),
            prompts.clone(),
        )),
        Arc::new(LanguageModelAgent::new(
            CODER_AGENT_ID,
            "This agent writes, changes, fixes and explains code. Use it for requests about \
             specific code, compiler errors, refactoring and implementation details.",
            CHAT_PURPOSE,
            CODER_TEMPLATE_ID,
            gateway.clone(),
            prompts.clone(),
        )),
        Arc::new(LanguageModelAgent::new(
            ARCHITECT_AGENT_ID,
            "This agent reasons about system design: module boundaries, data flow, concurrency \
             and trade-offs between architectures. It proposes designs rather than full code.",
            CHAT_PURPOSE,
            ARCHITECT_TEMPLATE_ID,
            gateway,
            prompts,
        )),
    ]
}
