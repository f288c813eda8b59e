//! Autocat Core Library
//!
//! Classifies Firefly III transactions with a language model:
//! - Firefly III REST client (option sets, transactions, write-back)
//! - Prompt library with three prompt strategies and user overrides
//! - Pluggable model backends (OpenAI-compatible, mock)
//! - Classification engine that validates answers before writing them

pub mod ai;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod prompts;

/// Test utilities including mock Firefly III and model servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    FunctionSpec, InferenceRequest, MockBackend, MockReply, ModelBackend, ModelClient,
    OpenAICompatibleBackend,
};
pub use config::{BackendKind, Config, FileConfig};
pub use engine::{ClassificationEngine, Resolution, Verdict};
pub use error::{Error, Result};
pub use ledger::LedgerClient;
pub use models::{
    Bill, ClassificationResult, JournalEntry, ModelAnswer, OptionSet, PromptStrategy,
    RejectionPolicy, ResolvedIds, Transaction,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
