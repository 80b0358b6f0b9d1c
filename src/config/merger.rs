// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub no_record: bool,
    pub log_level: Option<String>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.switchyard.local.json)
/// 3. Workspace config (.switchyard.json)
/// 4. Global config (~/.switchyard/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref provider) = config.provider {
        result.provider = provider.clone();
    }

    if let Some(ref model) = config.model {
        result.model = model.clone();
    }

    if config.base_url.is_some() {
        result.base_url = config.base_url.clone();
    }

    if let Some(ref env) = config.api_key_env {
        result.api_key_env = env.clone();
    }

    if let Some(ref purposes) = config.purposes {
        result.purposes.extend(purposes.clone());
    }

    if let Some(ref agent) = config.default_agent {
        result.default_agent = agent.clone();
    }

    if let Some(ref agent) = config.fallback_agent {
        result.fallback_agent = agent.clone();
    }

    if let Some(ref disabled) = config.disabled_agents {
        for id in disabled {
            if !result.disabled_agents.contains(id) {
                result.disabled_agents.push(id.clone());
            }
        }
    }

    if let Some(ref ollama) = config.ollama {
        if ollama.host.is_some() {
            result.ollama_host = ollama.host.clone();
        }
        if let Some(ref models) = ollama.models {
            for model in models {
                match result.ollama_models.iter_mut().find(|m| m.id == model.id) {
                    Some(existing) => existing.model = model.model.clone(),
                    None => result.ollama_models.push(model.clone()),
                }
            }
        }
    }

    if let Some(ref recording) = config.recording {
        if let Some(enabled) = recording.enabled {
            result.recording_enabled = enabled;
        }
        if let Some(ref path) = recording.path {
            result.recording_path = path.clone();
        }
    }

    if let Some(ref level) = config.log_level {
        result.log_level = level.clone();
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref provider) = cli.provider {
        result.provider = provider.clone();
    }

    if let Some(ref model) = cli.model {
        result.model = model.clone();
    }

    if cli.base_url.is_some() {
        result.base_url = cli.base_url.clone();
    }

    if cli.no_record {
        result.recording_enabled = false;
    }

    if let Some(ref level) = cli.log_level {
        result.log_level = level.clone();
    }
}
