// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Prompt templates and the variables they reference.
//!
//! Templates use a small handlebars-like syntax:
//!
//! - `{{name}}` and `{{name:arg}}` are replaced by the matching
//!   [`VariableResolver`]
//! - `{{!-- ... --}}` comments are stripped
//!
//! Variables are resolved at render time, so `{{chatAgents}}` always reflects
//! the registry as it is when the prompt is built.

mod templates;
mod variables;

pub use templates::{
    architect_template, builtin_templates, coder_template, orchestrator_template,
    universal_template, ARCHITECT_TEMPLATE_ID, CODER_TEMPLATE_ID, ORCHESTRATOR_TEMPLATE_ID,
    UNIVERSAL_TEMPLATE_ID,
};
pub use variables::{format_chat_agents, ChatAgentsVariable, TodayVariable};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{!--[\s\S]*?--\}\}").expect("valid comment regex"));

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)(?::([^{}]*?))?\s*\}\}")
        .expect("valid variable regex")
});

/// A named prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub id: String,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
        }
    }
}

/// Supplies the value of one template variable.
#[async_trait]
pub trait VariableResolver: Send + Sync {
    /// Variable name as written in templates.
    fn name(&self) -> &str;

    /// Resolve the variable. `None` leaves the reference untouched.
    async fn resolve(&self, arg: Option<&str>) -> Option<String>;
}

/// Holds templates and renders them with the registered variables.
#[derive(Default)]
pub struct PromptService {
    templates: RwLock<HashMap<String, PromptTemplate>>,
    resolvers: RwLock<HashMap<String, Arc<dyn VariableResolver>>>,
}

impl PromptService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with the built-in templates and the `today` variable.
    pub async fn with_builtins() -> Self {
        let service = Self::new();
        for template in builtin_templates() {
            service.store_template(template).await;
        }
        service.register_variable(Arc::new(TodayVariable)).await;
        service
    }

    /// Add or replace a template.
    pub async fn store_template(&self, template: PromptTemplate) {
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template);
    }

    pub async fn get_template(&self, id: &str) -> Option<PromptTemplate> {
        self.templates.read().await.get(id).cloned()
    }

    /// Add or replace a variable resolver.
    pub async fn register_variable(&self, resolver: Arc<dyn VariableResolver>) {
        self.resolvers
            .write()
            .await
            .insert(resolver.name().to_string(), resolver);
    }

    /// Render the template with `id`, or `None` if it is unknown.
    pub async fn get_prompt(&self, id: &str) -> Option<String> {
        self.get_prompt_with(id, &[]).await
    }

    /// Like [`get_prompt`](Self::get_prompt), with `overrides` taking
    /// precedence over registered variables of the same name.
    pub async fn get_prompt_with(
        &self,
        id: &str,
        overrides: &[Arc<dyn VariableResolver>],
    ) -> Option<String> {
        let template = self.get_template(id).await?;
        Some(self.render_with(&template.template, overrides).await)
    }

    /// Strip comments and substitute variables in `text`.
    pub async fn render(&self, text: &str) -> String {
        self.render_with(text, &[]).await
    }

    async fn render_with(&self, text: &str, overrides: &[Arc<dyn VariableResolver>]) -> String {
        let stripped = COMMENT_RE.replace_all(text, "");
        let mut resolvers = self.resolvers.read().await.clone();
        for resolver in overrides {
            resolvers.insert(resolver.name().to_string(), resolver.clone());
        }

        let mut rendered = String::with_capacity(stripped.len());
        let mut last = 0;
        for captures in VARIABLE_RE.captures_iter(&stripped) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let name = &captures[1];
            let arg = captures.get(2).map(|m| m.as_str().trim());

            rendered.push_str(&stripped[last..whole.start()]);
            let value = match resolvers.get(name) {
                Some(resolver) => resolver.resolve(arg).await,
                None => None,
            };
            match value {
                Some(value) => rendered.push_str(&value),
                None => {
                    debug!(variable = %name, "Unresolved prompt variable left in place");
                    rendered.push_str(whole.as_str());
                }
            }
            last = whole.end();
        }
        rendered.push_str(&stripped[last..]);
        rendered.trim_start().to_string()
    }
}
