// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for switchyard.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.switchyard/config.json
//! - Workspace config: .switchyard.json, .switchyard/config.json, or switchyard.config.json
//!   (each also as `.yaml`/`.yml`)
//! - Local config: .switchyard.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_example_config, get_global_config_dir, get_global_config_path,
    init_config, load_config_file, load_global_config, load_local_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{
    OllamaConfig, RecordingConfig, ResolvedConfig, WorkspaceConfig, DEFAULT_API_KEY_ENV,
    DEFAULT_RECORDING_PATH,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    let config = merge_config(global, workspace, local, cli_options);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert!(!config.provider.is_empty());
    }

    #[test]
    fn test_local_overrides_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".switchyard.json"),
            r#"{"provider": "openai", "defaultAgent": "Universal"}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join(".switchyard.local.json"),
            r#"{"defaultAgent": "Coder"}"#,
        )
        .unwrap();

        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.default_agent, "Coder");
    }

    #[test]
    fn test_load_config_cli_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".switchyard.json"), r#"{"provider": "openai"}"#).unwrap();

        let cli = CliOptions {
            provider: Some("ollama".to_string()),
            ..Default::default()
        };
        let config = load_config(temp.path(), cli).unwrap();
        assert_eq!(config.provider, "ollama");
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".switchyard.json"), r#"{"provider": "anthropic"}"#).unwrap();

        assert!(matches!(
            load_config(temp.path(), CliOptions::default()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
