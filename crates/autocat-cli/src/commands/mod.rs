//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `classify` - Classify transactions (with optional dry run)
//! - `ledger` - Option sets and connectivity checks
//! - `prompts` - Prompt preview and prompt library management

pub mod classify;
pub mod ledger;
pub mod prompts;

// Re-export command functions for main.rs
pub use classify::*;
pub use ledger::*;
pub use prompts::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
