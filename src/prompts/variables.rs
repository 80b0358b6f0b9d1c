// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in template variables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Weak;

use crate::agents::{AgentRegistry, SharedAgent};

use super::VariableResolver;

/// `{{today}}`, `{{today:inIso8601}}`, `{{today:inUnixSeconds}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodayVariable;

impl TodayVariable {
    pub const IN_ISO_8601: &'static str = "inIso8601";
    pub const IN_UNIX_SECONDS: &'static str = "inUnixSeconds";

    /// Format `now` for the given argument.
    pub fn format(now: DateTime<Utc>, arg: Option<&str>) -> String {
        match arg {
            Some(Self::IN_ISO_8601) => now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            Some(Self::IN_UNIX_SECONDS) => {
                let millis = now.timestamp_millis();
                ((millis + 500).div_euclid(1000)).to_string()
            }
            _ => now.format("%a %b %d %Y").to_string(),
        }
    }
}

#[async_trait]
impl VariableResolver for TodayVariable {
    fn name(&self) -> &str {
        "today"
    }

    async fn resolve(&self, arg: Option<&str>) -> Option<String> {
        Some(Self::format(Utc::now(), arg))
    }
}

/// `{{chatAgents}}`: the registered agents, read when the prompt renders.
pub struct ChatAgentsVariable {
    registry: Weak<AgentRegistry>,
}

impl ChatAgentsVariable {
    pub fn new(registry: Weak<AgentRegistry>) -> Self {
        Self { registry }
    }
}

/// Markdown list of agents in the given order.
pub fn format_chat_agents(agents: &[SharedAgent]) -> String {
    let mut out = String::new();
    for agent in agents {
        let _ = writeln!(out, "### {}", agent.id());
        let _ = writeln!(out, "ID: {}", agent.id());
        let _ = writeln!(out, "Name: {}", agent.name());
        let _ = writeln!(out, "Description: {}", agent.description());
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[async_trait]
impl VariableResolver for ChatAgentsVariable {
    fn name(&self) -> &str {
        "chatAgents"
    }

    async fn resolve(&self, _arg: Option<&str>) -> Option<String> {
        let registry = self.registry.upgrade()?;
        Some(format_chat_agents(&registry.get_agents().await))
    }
}
