//! Autocat CLI - LLM transaction classifier for Firefly III
//!
//! Usage:
//!   autocat classify 123 124      Classify transactions and write back
//!   autocat classify 123 --dry-run
//!   autocat options               Show categories, budgets and bills
//!   autocat check                 Check Firefly III and model connectivity
//!   autocat prompt 123            Show the prompt for a transaction
//!   autocat prompts list          List prompts (needs no credentials)

mod cli;
mod commands;


use anyhow::{Context, Result};
use autocat_core::{ClassificationEngine, Config, PromptLibrary};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    // Prompt inspection needs only the prompt library
    let command = match cli.command {
        Commands::Prompts { action } => {
            let library = commands::load_prompt_library(cli.config.as_deref())?;
            return run_prompts(&library, action);
        }
        command => command,
    };

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let engine =
        ClassificationEngine::from_config(&config).context("Failed to set up the classifier")?;

    match command {
        Commands::Classify { ids, dry_run, json } => {
            commands::cmd_classify(&engine, &ids, dry_run, json).await
        }
        Commands::Options => commands::cmd_options(&engine).await,
        Commands::Check => commands::cmd_check(&engine).await,
        Commands::Prompt { id } => commands::cmd_prompt(&engine, &id).await,
        Commands::Prompts { action } => run_prompts(engine.prompts(), action),
    }
}

fn run_prompts(library: &PromptLibrary, action: Option<PromptsAction>) -> Result<()> {
    match action {
        None | Some(PromptsAction::List) => commands::cmd_prompts_list(library),
        Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(library, &prompt_id),
        Some(PromptsAction::Path) => commands::cmd_prompts_path(library),
    }
}
