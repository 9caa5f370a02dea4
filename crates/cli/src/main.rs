mod cli;
mod simulate;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lexio_core::config::{load_dotenv, Config};
use lexio_service::{InMemoryTemplateStore, TemplateStore};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = Config::from_env();
    if let Some(workers) = args.workers {
        config.pool.workers = workers.max(1);
    }
    config.log_summary();

    match args.command {
        Command::Simulate {
            students,
            level,
            exercises,
            accuracy,
        } => {
            let plan = simulate::Plan {
                students,
                level,
                exercises_per_student: exercises,
                accuracy,
            };
            let report = simulate::run(&config, &plan).await?;
            info!(
                evaluated = report.evaluated,
                correct = report.correct,
                elapsed_ms = report.elapsed_ms,
                "simulation finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Templates { level } => {
            let store = InMemoryTemplateStore::seeded(&config.store);
            let templates = store
                .all()
                .await
                .context("failed to load templates")?
                .into_iter()
                .filter(|t| level.map_or(true, |l| t.level == l))
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
    }

    Ok(())
}
