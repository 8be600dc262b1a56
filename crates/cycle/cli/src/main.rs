//! cycled - runs agent programs through the reasoning cycle
//!
//! Loads a runtime configuration and a program (JSON), starts one agent per
//! requested name in a shared session and prints each agent's final mental
//! state.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cycle_mental::MemoryKnowledgeBaseFactory;
use cycle_runtime::{AgentOutcome, NoEnvironment, RuntimeConfig, Session};
use cycle_types::{AgentId, Program};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reasoning cycle runner
#[derive(Parser)]
#[command(name = "cycled")]
#[command(about = "Run agent programs through the sense-deliberate-act cycle", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CYCLE_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, global = true, env = "CYCLE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true, env = "CYCLE_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session and print the final mental states
    Run {
        /// Program file (JSON)
        #[arg(short, long)]
        program: PathBuf,

        /// Agent names, comma separated
        #[arg(short, long, value_delimiter = ',', default_value = "agent")]
        agents: Vec<String>,

        /// Maximum rounds per agent
        #[arg(short, long)]
        rounds: Option<u64>,
    },

    /// Parse a program and report its modules
    Check {
        /// Program file (JSON)
        program: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
struct AgentReport {
    agent: AgentId,
    rounds: u64,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    beliefs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    goals: Option<Vec<String>>,
}

impl From<&AgentOutcome> for AgentReport {
    fn from(outcome: &AgentOutcome) -> Self {
        let status = match &outcome.result {
            Ok(()) => "finished".to_string(),
            Err(e) => e.to_string(),
        };
        let render = |formulas: &Vec<cycle_types::Formula>| {
            formulas.iter().map(ToString::to_string).collect::<Vec<_>>()
        };
        Self {
            agent: outcome.agent.clone(),
            rounds: outcome.rounds,
            status,
            beliefs: outcome.snapshot.as_ref().map(|s| render(&s.beliefs)),
            goals: outcome.snapshot.as_ref().map(|s| render(&s.goals)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = RuntimeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            program,
            agents,
            rounds,
        } => run(config, &program, agents, rounds).await,
        Commands::Check { program } => {
            let program = load_program(&program)?;
            println!("{}", program.name);
            println!("  language: {}", program.kr_language);
            println!("  mental models: {}", program.uses_mental_models);
            println!("  beliefs: {}", program.knowledge.len() + program.initial_beliefs.len());
            println!("  goals: {}", program.initial_goals.len());
            for module in &program.modules {
                println!(
                    "  module {} ({:?}, {} rules, exit {:?})",
                    module.display_name(),
                    module.kind,
                    module.rules.rules.len(),
                    module.exit_condition()
                );
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(
    mut config: RuntimeConfig,
    program: &Path,
    agents: Vec<String>,
    rounds: Option<u64>,
) -> anyhow::Result<()> {
    if rounds.is_some() {
        config.cycle.max_rounds = rounds;
    }
    let program = Arc::new(load_program(program)?);

    let mut session = Session::new(config, Arc::new(MemoryKnowledgeBaseFactory));
    for name in agents.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        session
            .add_agent(AgentId::new(name), program.clone(), Arc::new(NoEnvironment))
            .with_context(|| format!("Failed to create agent {}", name))?;
    }
    if session.registry().count() == 0 {
        bail!("No agents to run");
    }

    let registry = session.registry().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping agents");
            registry.kill_all();
        }
    });

    session.start()?;
    let outcomes = session.join().await;

    let reports: Vec<AgentReport> = outcomes.iter().map(AgentReport::from).collect();
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = outcomes.iter().filter(|o| !o.is_clean()).count();
    if failed > 0 {
        bail!("{} agent(s) terminated with errors", failed);
    }
    Ok(())
}

fn load_program(path: &Path) -> anyhow::Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program {}", path.display()))?;
    Program::from_json(&text).with_context(|| format!("Invalid program {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "cycled", "run", "--program", "p.json", "--agents", "a,b", "--rounds", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                program,
                agents,
                rounds,
            } => {
                assert_eq!(program, PathBuf::from("p.json"));
                assert_eq!(agents, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(rounds, Some(3));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_load_program_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "hello", "initial_beliefs": ["ready"], "modules": []}}"#
        )
        .unwrap();
        let program = load_program(file.path()).unwrap();
        assert_eq!(program.name, "hello");
        assert_eq!(program.initial_beliefs.len(), 1);

        assert!(load_program(Path::new("/nonexistent/program.json")).is_err());
    }

    #[tokio::test]
    async fn test_run_reports_every_agent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "idle"}}"#).unwrap();
        let result = run(
            RuntimeConfig::testing(),
            file.path(),
            vec!["a".to_string(), "b".to_string()],
            Some(2),
        )
        .await;
        assert!(result.is_ok());
    }
}
