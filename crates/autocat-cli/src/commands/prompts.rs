//! Prompts-related command implementations

use std::path::Path;

use anyhow::{Context, Result};
use autocat_core::prompts::default_prompts_dir;
use autocat_core::{ClassificationEngine, Config, PromptId, PromptLibrary};

/// Render the request that would be sent for a transaction
pub async fn cmd_prompt(engine: &ClassificationEngine, id: &str) -> Result<()> {
    let transaction = engine
        .ledger()
        .get_transaction(id)
        .await
        .with_context(|| format!("Failed to load transaction {}", id))?;
    let request = engine
        .preview_request(&transaction)
        .await
        .context("Failed to build the prompt")?;

    println!("Transaction: {} ({:.2})", transaction.description, transaction.amount);
    println!("Strategy: {}", engine.strategy());
    println!();
    println!("--- Prompt ---");
    println!("{}", request.prompt);

    if let Some(function) = request.function {
        println!();
        println!("--- Function: {} ---", function.name);
        println!("{}", serde_json::to_string_pretty(&function.parameters)?);
    }

    Ok(())
}

/// Load the prompt library from the config file and environment alone
///
/// Ledger and model settings are not read, so the `prompts` subcommands
/// work without credentials.
pub fn load_prompt_library(config_path: Option<&Path>) -> Result<PromptLibrary> {
    let dir = Config::load_prompts_dir(config_path).context("Failed to load configuration")?;
    PromptLibrary::from_config_dir(dir).context("Failed to load prompts")
}

/// List all available prompts and their override status
pub fn cmd_prompts_list(library: &PromptLibrary) -> Result<()> {
    println!("Available Prompts:\n");

    println!("{:<22} {:>7}  {:<10}  {}", "ID", "VERSION", "STRATEGY", "OVERRIDE");
    println!("{}", "-".repeat(60));

    for info in library.list() {
        let override_status = if info.has_override {
            "✓ Custom"
        } else {
            "Default"
        };

        println!(
            "{:<22} {:>7}  {:<10}  {}",
            info.id, info.version, info.strategy.as_str(), override_status
        );
    }

    println!();
    println!(
        "Override directory: {}",
        library
            .override_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );

    Ok(())
}

/// Show the template of a specific prompt
pub fn cmd_prompts_show(library: &PromptLibrary, prompt_id: &str) -> Result<()> {
    let Some(&id) = PromptId::all().iter().find(|id| id.as_str() == prompt_id) else {
        eprintln!("Unknown prompt ID: {}", prompt_id);
        eprintln!();
        eprintln!("Available prompts:");
        for id in PromptId::all() {
            eprintln!("  - {}", id.as_str());
        }
        anyhow::bail!("Unknown prompt ID: {}", prompt_id);
    };

    let prompt = library.get(id)?;

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!("Strategy: {}", prompt.metadata.strategy);
    println!(
        "Source: {}",
        if prompt.is_override {
            "Override"
        } else {
            "Default"
        }
    );

    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    println!();
    println!("--- Content ---");
    println!("{}", prompt.content);

    Ok(())
}

/// Show the path where prompt overrides should be placed
pub fn cmd_prompts_path(library: &PromptLibrary) -> Result<()> {
    match library.override_dir().cloned().or_else(default_prompts_dir) {
        Some(path) => {
            println!("{}", path.display());

            if !path.exists() {
                eprintln!();
                eprintln!("Note: This directory does not exist yet.");
                eprintln!("Create it and copy a prompt there to customize it.");
            }
        }
        None => {
            eprintln!("Could not determine prompts directory.");
            eprintln!("Set AUTOCAT_PROMPTS_DIR or prompts_dir in the config file.");
        }
    }

    Ok(())
}
