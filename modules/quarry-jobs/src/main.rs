use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quarry_engine::{resolver, HandlerRegistry, Orchestrator, RunPlan};
use quarry_jobs::ai::OpenAiChat;
use quarry_jobs::flagger::OpenAlexSearch;

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAILTO: &str = "data@example.org";

#[derive(Parser)]
#[command(name = "quarry", about = "Data-collection job pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every job in the plan in dependency order.
    Run {
        /// Path to the run plan JSON file.
        #[arg(long, default_value = "plan.json")]
        plan: PathBuf,
        /// Run a single named job, ignoring dependency order.
        #[arg(long)]
        only: Option<String>,
    },
    /// Resolve and print the execution order without running anything.
    Order {
        #[arg(long, default_value = "plan.json")]
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            // Fatal: bad plan or unresolvable dependency graph.
            error!(error = format!("{err:#}").as_str(), "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Order { plan } => {
            let plan = RunPlan::load(&plan)?;
            let ordered = resolver::resolve(&plan.jobs)?;
            for job in ordered {
                println!("-> {}", job.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { plan, only } => {
            let plan = RunPlan::load(&plan)?;
            let orchestrator = Orchestrator::new(build_registry()?);

            match only {
                Some(name) => {
                    let result = orchestrator.run_single(&plan, &name).await?;
                    info!(
                        job = result.name.as_str(),
                        success = result.is_success(),
                        "Single-job run complete"
                    );
                }
                None => {
                    // Best effort: per-job failures are logged, not fatal.
                    orchestrator.run(&plan).await?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_registry() -> Result<HandlerRegistry> {
    // Secrets come from the environment, never from the plan. A missing key
    // only fails the jobs that need it, once they run.
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY not set; entity-extraction jobs will fail");
    }
    let model =
        std::env::var("QUARRY_CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
    let chat = Arc::new(OpenAiChat::new(api_key, model)?);

    let mailto = std::env::var("OPENALEX_MAILTO").unwrap_or_else(|_| DEFAULT_MAILTO.to_string());
    let search = Arc::new(OpenAlexSearch::new(mailto)?);

    let mut registry = HandlerRegistry::new();
    quarry_jobs::register_all(&mut registry, chat, search);
    Ok(registry)
}
