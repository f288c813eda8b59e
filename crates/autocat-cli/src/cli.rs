//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Autocat - Classify Firefly III transactions with a language model
#[derive(Parser)]
#[command(name = "autocat")]
#[command(about = "LLM transaction classifier for Firefly III", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/autocat/config.toml when present)
    ///
    /// Environment variables (FIREFLY_URL, FIREFLY_PERSONAL_TOKEN,
    /// OPENAI_API_KEY, ...) override values from the file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify transactions by id and write the result to Firefly III
    Classify {
        /// Transaction (group) ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Ask the model and validate the answer without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print one JSON object per transaction instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the categories, budgets and bills the model may choose from
    Options,

    /// Check that Firefly III and the model backend are reachable
    Check,

    /// Show the prompt that would be sent for a transaction
    Prompt {
        /// Transaction (group) id
        id: String,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the template of a specific prompt
    Show {
        /// Prompt ID (classify_json, classify_label, classify_function)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
