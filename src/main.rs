// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Switchyard main entry point - CLI and commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use switchyard::agents::{AgentRegistry, AgentSettings};
use switchyard::chat::{ProgressStatus, ResponseContent, ResponseEvent};
use switchyard::config::{self, CliOptions, ResolvedConfig};
use switchyard::gateway::{build_gateway, remote_catalog};
use switchyard::prompts::PromptService;
use switchyard::recording::{
    NullRecorder, RecordedInteraction, RecordingStore, SharedRecorder, SqliteRecorder,
};
use switchyard::service::ChatService;
use switchyard::telemetry::{init_telemetry, CorrelationId, TelemetryConfig, GLOBAL_METRICS};
use switchyard::types::LanguageModel;

/// Switchyard - routes chat requests to specialized AI agents.
#[derive(Parser)]
#[command(name = "switchyard")]
#[command(author, version, about = "Routes chat requests to specialized AI agents", long_about = None)]
struct Cli {
    /// Language model backend
    #[arg(short, long, env = "SWITCHYARD_PROVIDER")]
    provider: Option<Provider>,

    /// Default model id
    #[arg(short, long, env = "SWITCHYARD_MODEL")]
    model: Option<String>,

    /// Base URL for the API
    #[arg(long, env = "SWITCHYARD_BASE_URL")]
    base_url: Option<String>,

    /// Show info-level logs
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available language model backends.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// OpenAI - GPT models
    Openai,
    /// Ollama - Local models
    Ollama,
    /// Any OpenAI-compatible endpoint
    OpenaiCompatible,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Openai => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::OpenaiCompatible => write!(f, "openai-compatible"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send one chat message and print the response
    Ask {
        /// Address an agent directly instead of letting the orchestrator route
        #[arg(short, long)]
        agent: Option<String>,

        /// Do not record routing interactions
        #[arg(long)]
        no_record: bool,

        /// Print a metrics report afterwards
        #[arg(long)]
        metrics: bool,

        /// Message text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List registered agents
    Agents,

    /// Inspect language models
    Models {
        #[command(subcommand)]
        action: Option<ModelsAction>,
    },

    /// Show recorded routing interactions
    Recordings {
        /// Maximum number of interactions to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Show a single interaction by correlation id
        #[arg(long)]
        id: Option<String>,
    },

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ModelsAction {
    /// Models registered in the gateway and their purposes
    List,
    /// Models installed on the local Ollama host
    Local,
    /// Models served by the configured OpenAI-compatible endpoint
    Remote,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the merged configuration
    Show,
    /// Write an example .switchyard.json
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let workspace_root = std::env::current_dir()?;

    if let Commands::Config {
        action: Some(ConfigAction::Init),
    } = cli.command
    {
        let path = config::init_config(&workspace_root, None)?;
        println!("Created config file: {}", path.display());
        return Ok(());
    }

    let no_record = matches!(cli.command, Commands::Ask { no_record: true, .. });
    let log_level = if cli.debug {
        Some("debug".to_string())
    } else if cli.verbose {
        Some("info".to_string())
    } else {
        None
    };
    let cli_options = CliOptions {
        provider: cli.provider.map(|p| p.to_string()),
        model: cli.model,
        base_url: cli.base_url,
        no_record,
        log_level,
    };

    let root = config::find_workspace_root(&workspace_root).unwrap_or(workspace_root);
    let config = config::load_config(&root, cli_options)?;

    let telemetry = TelemetryConfig::default().with_level_name(&config.log_level);
    let _guard = init_telemetry(&telemetry)?;

    match cli.command {
        Commands::Ask {
            agent,
            metrics,
            text,
            ..
        } => {
            let text = text.join(" ");
            let text = match agent {
                Some(agent) => format!("@{} {}", agent, text),
                None => text,
            };
            handle_ask(&config, &root, &text).await?;
            if metrics {
                eprintln!("\n{}", GLOBAL_METRICS.snapshot().format_report().dimmed());
            }
            Ok(())
        }
        Commands::Agents => handle_agents(&config).await,
        Commands::Models { action } => handle_models(&config, action).await,
        Commands::Recordings { limit, id } => handle_recordings(&config, &root, limit, id),
        Commands::Config { .. } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn build_service(
    config: &ResolvedConfig,
    recorder: SharedRecorder,
) -> anyhow::Result<ChatService> {
    let (gateway, _ollama) = build_gateway(config).await?;
    let prompts = Arc::new(PromptService::with_builtins().await);
    let settings = AgentSettings {
        fallback_agent_id: config.fallback_agent.clone(),
        disabled_agents: config.disabled_agents.clone(),
    };
    let registry = AgentRegistry::with_defaults(gateway, prompts, recorder, &settings).await?;
    Ok(ChatService::new(registry, &config.default_agent))
}

async fn handle_ask(config: &ResolvedConfig, root: &Path, text: &str) -> anyhow::Result<()> {
    let sqlite = if config.recording_enabled {
        Some(Arc::new(SqliteRecorder::open(&config.recording_path_in(root))?))
    } else {
        None
    };
    let recorder: SharedRecorder = match &sqlite {
        Some(recorder) => recorder.clone(),
        None => Arc::new(NullRecorder),
    };

    let service = build_service(config, recorder).await?;
    let mut handle = service.send_request(service.create_session(), text).await;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let mut failure = None;
    while let Some(event) = handle.next_event().await {
        match event {
            ResponseEvent::Content(ResponseContent::Text(delta)) => {
                spinner.finish_and_clear();
                print!("{}", delta);
            }
            ResponseEvent::Content(ResponseContent::Informational(note)) => {
                spinner.suspend(|| print!("{}", note.dimmed()));
            }
            ResponseEvent::Progress(progress) => match progress.status {
                ProgressStatus::InProgress => spinner.set_message(progress.content),
                ProgressStatus::Failed => {
                    spinner.suspend(|| eprintln!("{} {}", "!".yellow(), progress.content))
                }
                ProgressStatus::Completed => {}
            },
            ResponseEvent::AgentChanged { from, to } => {
                tracing::debug!(%from, %to, "Response reassigned");
            }
            ResponseEvent::Completed => break,
            ResponseEvent::Failed(reason) => {
                failure = Some(reason);
                break;
            }
        }
    }
    spinner.finish_and_clear();

    let lagged = handle.skipped_events() > 0;
    let response = handle.wait().await?;
    println!();
    if lagged {
        println!("{}\n{}", "--- full response ---".dimmed(), response.text());
    }
    if let Some(reason) = failure {
        eprintln!("{}", reason.red());
    } else {
        eprintln!("{}", format!("answered by @{}", response.agent_id()).dimmed());
    }

    if let Some(recorder) = sqlite {
        recorder.shutdown();
    }
    Ok(())
}

async fn handle_agents(config: &ResolvedConfig) -> anyhow::Result<()> {
    let service = build_service(config, Arc::new(NullRecorder)).await?;
    for agent in service.registry().get_agents().await {
        let marker = if agent.id() == service.default_agent_id() {
            " (default)".green().to_string()
        } else {
            String::new()
        };
        println!("{}{}", format!("@{}", agent.id()).bright_white().bold(), marker);
        println!("  {}", agent.description().dimmed());
    }
    Ok(())
}

async fn handle_models(
    config: &ResolvedConfig,
    action: Option<ModelsAction>,
) -> anyhow::Result<()> {
    let (gateway, ollama) = build_gateway(config).await?;
    match action.unwrap_or(ModelsAction::List) {
        ModelsAction::List => {
            println!("{}", "Registered models".bright_blue().bold());
            for id in gateway.models().await {
                let name = match gateway.get_model(&id).await {
                    Some(model) => format!("{} {}", model.name(), model.model()),
                    None => String::new(),
                };
                println!("  {} [{}]", id.bright_white(), name);
            }
            let mut purposes: Vec<_> = config.purposes.iter().collect();
            purposes.sort();
            for (purpose, model_id) in purposes {
                println!("  {} -> {}", purpose.cyan(), model_id);
            }
        }
        ModelsAction::Remote => {
            let catalog = remote_catalog(config)?;
            println!("{}", format!("Models served by {}", catalog.name()).bright_blue().bold());
            let mut models = catalog.list_models().await?;
            models.sort_by(|a, b| a.id.cmp(&b.id));
            for model in models {
                println!("  {}", model.id.bright_white());
            }
        }
        ModelsAction::Local => {
            let host = ollama.host().unwrap_or_default();
            println!("{}", format!("Ollama models on {}", host).bright_blue().bold());
            for model in ollama.list_local_models().await? {
                match model.size_bytes {
                    Some(size) => println!("  {} ({} MB)", model.id.bright_white(), size / 1_000_000),
                    None => println!("  {}", model.id.bright_white()),
                }
            }
        }
    }
    Ok(())
}

fn handle_recordings(
    config: &ResolvedConfig,
    root: &Path,
    limit: usize,
    id: Option<String>,
) -> anyhow::Result<()> {
    let path = config.recording_path_in(root);
    if !path.exists() {
        println!("No recordings at {}", path.display());
        return Ok(());
    }
    let store = RecordingStore::open_at(&path)?;

    match id {
        Some(id) => {
            let correlation_id: CorrelationId = id.parse()?;
            match store.find_interaction(&correlation_id)? {
                Some(interaction) => print_interaction(&interaction, true),
                None => println!("No interaction {}", correlation_id),
            }
        }
        None => {
            let interactions = store.list_interactions(limit)?;
            println!(
                "{}",
                format!("{} of {} interactions", interactions.len(), store.count()?)
                    .bright_blue()
                    .bold()
            );
            for interaction in &interactions {
                print_interaction(interaction, false);
            }
        }
    }
    Ok(())
}

fn print_interaction(interaction: &RecordedInteraction, full: bool) {
    let request = &interaction.request;
    let when = chrono::DateTime::from_timestamp_millis(request.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "{} {} {}",
        request.correlation_id.to_string().yellow(),
        when.dimmed(),
        format!("@{}", request.agent_id).bright_white()
    );

    if full {
        if let Some(ref prompt) = request.system_prompt {
            println!("{}\n{}", "system:".cyan(), prompt);
        }
        for message in &request.messages {
            println!("{}\n{}", format!("{}:", message.role.as_str()).cyan(), message.content);
        }
    }

    match &interaction.response {
        Some(response) => println!("  -> {}", response.response),
        None => println!("  -> {}", "(no response)".dimmed()),
    }
}
