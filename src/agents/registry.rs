// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent registry.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::gateway::LanguageModelGateway;
use crate::prompts::{ChatAgentsVariable, PromptService};
use crate::recording::SharedRecorder;

use super::{default_agents, SharedAgent, UNIVERSAL_AGENT_ID};

/// Settings applied when registering the built-in agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Agent used when routing yields no candidate.
    pub fallback_agent_id: String,
    /// Built-in agents to leave out.
    pub disabled_agents: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            fallback_agent_id: UNIVERSAL_AGENT_ID.to_string(),
            disabled_agents: Vec::new(),
        }
    }
}

/// Registered agents in registration order.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<Vec<SharedAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in agents.
    ///
    /// Also registers the `chatAgents` prompt variable backed by the new
    /// registry.
    pub async fn with_defaults(
        gateway: Arc<LanguageModelGateway>,
        prompts: Arc<PromptService>,
        recorder: SharedRecorder,
        settings: &AgentSettings,
    ) -> Result<Arc<Self>, DispatchError> {
        let registry = Arc::new(Self::new());
        prompts
            .register_variable(Arc::new(ChatAgentsVariable::new(Arc::downgrade(&registry))))
            .await;

        let agents = default_agents(
            gateway,
            prompts,
            recorder,
            Arc::downgrade(&registry),
            &settings.fallback_agent_id,
        );
        for agent in agents {
            if settings.disabled_agents.iter().any(|id| id == agent.id()) {
                debug!(agent = %agent.id(), "Skipping disabled agent");
                continue;
            }
            registry.register(agent).await?;
        }
        Ok(registry)
    }

    /// Add an agent. Ids must be unique.
    pub async fn register(&self, agent: SharedAgent) -> Result<(), DispatchError> {
        let mut agents = self.agents.write().await;
        if agents.iter().any(|a| a.id() == agent.id()) {
            warn!(agent = %agent.id(), "Attempted to register an agent that already exists");
            return Err(DispatchError::DuplicateAgent(agent.id().to_string()));
        }
        info!(agent = %agent.id(), "Registered chat agent");
        agents.push(agent);
        Ok(())
    }

    /// Remove an agent by id.
    ///
    /// Requests already delegated to it keep their own handle and finish.
    pub async fn unregister(&self, id: &str) -> Option<SharedAgent> {
        let mut agents = self.agents.write().await;
        let index = agents.iter().position(|a| a.id() == id)?;
        info!(agent = %id, "Unregistered chat agent");
        Some(agents.remove(index))
    }

    pub async fn get_agent(&self, id: &str) -> Option<SharedAgent> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.id() == id)
            .cloned()
    }

    /// Snapshot of all agents in registration order.
    pub async fn get_agents(&self) -> Vec<SharedAgent> {
        self.agents.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}
