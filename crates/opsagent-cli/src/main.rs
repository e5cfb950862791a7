//! Ops Agent CLI - thin demonstration binary.
//!
//! Wires config -> telemetry -> provider router -> tool registry ->
//! agent loop, and exposes the loop through a small `clap` command
//! surface: `chat` runs one user turn, `history` inspects the in-memory
//! audit store, `config` shows/validates the loaded document, `init`
//! scaffolds a starter config file.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsagent_audit::{AuditStorage, SessionStatus};
use opsagent_core::SessionId;
use opsagent_runtime::{AgentLoop, ToolExecutor};
use opsagent_telemetry::{setup_logging, LogConfig, LogFormat};

mod wiring;

/// Ops Agent - natural-language front end for fleet operations.
#[derive(Parser)]
#[command(name = "opsagent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, env = "OPSAGENT_CONFIG", default_value = "opsagent.toml")]
    config: PathBuf,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one natural-language request through the agent loop.
    Chat {
        /// The request text.
        prompt: String,
        /// Explicit provider name; overrides scenario routing and the
        /// configured default.
        #[arg(short, long)]
        provider: Option<String>,
        /// Scenario tag consulted by the routing table when `--provider`
        /// is not given.
        #[arg(short, long)]
        scenario: Option<String>,
        /// Cap on model/tool-execution iterations for this session.
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// List recent audit sessions recorded by this process.
    History {
        /// Number of sessions to show, most recent first.
        #[arg(short = 'n', long, default_value_t = 10)]
        last: usize,
    },

    /// Inspect the loaded configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Write a starter configuration file if one does not already
    /// exist at the configured path.
    Init,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the resolved configuration document.
    Show,
    /// Load and validate the configuration without running anything.
    Validate,
}

const STARTER_CONFIG: &str = r#"# Ops Agent configuration.
# Documentation: see SPEC_FULL.md in the repository root.

[llm]
default_provider = "claude"

[llm.providers.claude]
model = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"
max_tokens = 4096
temperature = 0.7

[[policies]]
name = "deny-destructive-prod"
effect = "deny"
message = "destructive actions are denied in production"

[policies.condition]
env = "prod"
action_type = "destructive"

[[policies]]
name = "confirm-writes-prod"
effect = "require_confirm"
message = "this write touches production; confirm to proceed"

[policies.condition]
env = "prod"
action_type = "write"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let log_config = LogConfig::new(level).with_format(LogFormat::Compact);
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Init => run_init(&cli.config),
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = opsagent_config::load_file(&cli.config)
                    .with_context(|| format!("loading {}", cli.config.display()))?;
                println!("{config:#?}");
                Ok(())
            },
            ConfigCommands::Validate => {
                opsagent_config::load_file(&cli.config)
                    .with_context(|| format!("loading {}", cli.config.display()))?;
                println!("configuration at {} is valid", cli.config.display());
                Ok(())
            },
        },
        Commands::History { last } => run_history(&cli.config, last).await,
        Commands::Chat {
            prompt,
            provider,
            scenario,
            max_iterations,
        } => run_chat(&cli.config, &prompt, provider.as_deref(), scenario.as_deref(), max_iterations).await,
    }
}

fn run_init(config_path: &PathBuf) -> Result<()> {
    if config_path.exists() {
        println!("{} already exists; leaving it untouched", config_path.display());
        return Ok(());
    }
    std::fs::write(config_path, STARTER_CONFIG)
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("wrote starter configuration to {}", config_path.display());
    Ok(())
}

async fn run_history(config_path: &PathBuf, last: usize) -> Result<()> {
    let config = opsagent_config::load_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let runtime = wiring::build_runtime(config);

    let sessions = runtime.audit.list_recent_sessions(last).await;
    if sessions.is_empty() {
        println!("no sessions recorded yet (audit storage is in-memory and per-process)");
        return Ok(());
    }
    for session in sessions {
        let status = match session.status {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Capped => "capped",
            SessionStatus::Failed => "failed",
        };
        println!(
            "{}  {}  [{status}]  {}",
            session.timestamp.to_rfc3339(),
            session.session_id,
            session.input
        );
        if let Some(output) = session.final_output {
            println!("    -> {output}");
        }
    }
    Ok(())
}

async fn run_chat(
    config_path: &PathBuf,
    prompt: &str,
    provider: Option<&str>,
    scenario: Option<&str>,
    max_iterations: Option<u32>,
) -> Result<()> {
    let config = opsagent_config::load_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let runtime = wiring::build_runtime(config);

    let llm_provider = runtime
        .router
        .get_provider(provider, scenario)
        .context("resolving an LLM provider")?;

    let executor = ToolExecutor::new(runtime.registry.clone(), runtime.audit.clone());
    let tool_defs = runtime.registry.definitions();
    let agent_loop = match max_iterations {
        Some(n) => AgentLoop::with_max_iterations(llm_provider, executor, runtime.audit.clone(), tool_defs, n),
        None => AgentLoop::new(llm_provider, executor, runtime.audit.clone(), tool_defs),
    };

    let session_id = SessionId::new();
    let outcome = agent_loop.run(session_id, prompt).await.context("running agent loop")?;

    println!("{}", outcome.response.content);
    if outcome.capped {
        eprintln!("warning: session {session_id} hit the iteration cap before reaching a final response");
    }
    Ok(())
}
