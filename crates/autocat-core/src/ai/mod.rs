//! Pluggable model backend abstraction
//!
//! # Architecture
//!
//! - `ModelBackend` trait: one single-turn inference plus health/identity
//! - `ModelClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//! - `parsing`: turns raw completions into `ModelAnswer`s, one function per strategy
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! let model = ModelClient::from_config(&config);
//!
//! let completion = model.infer(&InferenceRequest::text("Classify ...")).await?;
//! println!("{}", completion.content);
//! ```

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockReply};
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::models::Completion;

/// Trait defining the interface for all model backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send one user message, optionally constrained to a function call
    ///
    /// Non-2xx responses fail with `Error::Model { status: Some(_) }`; failures
    /// without an HTTP status use `status: None`. Never retried.
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete model client enum
///
/// Selected once from config at startup.
#[derive(Clone)]
pub enum ModelClient {
    /// OpenAI-compatible chat completions (OpenAI, vLLM, LocalAI, llama-server, Ollama)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ModelClient {
    /// Build the backend named in the config
    pub fn from_config(config: &Config) -> Self {
        match config.model.backend {
            BackendKind::OpenAICompatible => {
                ModelClient::OpenAICompatible(OpenAICompatibleBackend::from_config(&config.model))
            }
            BackendKind::Mock => {
                ModelClient::Mock(MockBackend::for_strategy(config.classification.strategy))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ModelClient::Mock(MockBackend::new())
    }
}

impl From<MockBackend> for ModelClient {
    fn from(backend: MockBackend) -> Self {
        ModelClient::Mock(backend)
    }
}

impl From<OpenAICompatibleBackend> for ModelClient {
    fn from(backend: OpenAICompatibleBackend) -> Self {
        ModelClient::OpenAICompatible(backend)
    }
}

// Implement ModelBackend for ModelClient by delegating to the inner backend
#[async_trait]
impl ModelBackend for ModelClient {
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion> {
        match self {
            ModelClient::OpenAICompatible(b) => b.infer(request).await,
            ModelClient::Mock(b) => b.infer(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ModelClient::OpenAICompatible(b) => b.health_check().await,
            ModelClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ModelClient::OpenAICompatible(b) => b.model(),
            ModelClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ModelClient::OpenAICompatible(b) => b.host(),
            ModelClient::Mock(b) => b.host(),
        }
    }
}
