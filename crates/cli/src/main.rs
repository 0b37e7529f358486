//! coscientist CLI — the main entry point.
//!
//! Commands:
//! - `run`   — Run a single task through the agent loop
//! - `serve` — Start the HTTP gateway
//! - `tools` — List the registered tools

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use coscientist_agent::{AgentLoop, RunOutcome};
use coscientist_config::AppConfig;
use coscientist_gateway::GatewayState;
use coscientist_providers::OpenAiCompatClient;

#[derive(Parser)]
#[command(
    name = "coscientist",
    about = "coscientist — agentic orchestrator over OCR and memory services",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to coscientist.toml (defaults to env-only configuration)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and print the outcome
    Run {
        /// The task to hand to the agent
        task: String,

        /// Override the step budget for this run
        #[arg(long)]
        max_steps: Option<u32>,

        /// Override the sampling temperature for this run
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the registered tools
    Tools,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load(p).with_context(|| format!("loading {}", p.display())),
        None => AppConfig::from_env().context("building config from environment"),
    }
}

fn build_agent(config: &AppConfig) -> anyhow::Result<(AgentLoop, Arc<coscientist_core::ToolRegistry>)> {
    let client = OpenAiCompatClient::from_config(&config.llm)?;
    let tools = Arc::new(coscientist_tools::build_registry(config)?);
    let agent = AgentLoop::from_config(Arc::new(client), tools.clone(), &config.agent);
    Ok((agent, tools))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            task,
            max_steps,
            temperature,
        } => {
            let (agent, _tools) = build_agent(&config)?;
            match agent.run_with(&task, max_steps, temperature).await? {
                RunOutcome::Answer { text, steps, .. } => {
                    println!("{text}");
                    tracing::info!(steps, "Run completed");
                }
                RunOutcome::BudgetExhausted { steps, .. } => {
                    eprintln!("Step budget exhausted after {steps} steps without a final answer.");
                    std::process::exit(2);
                }
            }
        }

        Commands::Serve { port } => {
            let mut gateway_config = config.gateway.clone();
            if let Some(p) = port {
                gateway_config.port = p;
            }
            let (agent, tools) = build_agent(&config)?;
            let state = Arc::new(GatewayState { agent, tools });
            coscientist_gateway::start(&gateway_config, state)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }

        Commands::Tools => {
            let tools = coscientist_tools::build_registry(&config)?;
            for def in tools.definitions() {
                println!("{}\t{}", def.name, def.description);
            }
        }
    }

    Ok(())
}
