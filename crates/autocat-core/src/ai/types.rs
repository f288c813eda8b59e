//! Model request types
//!
//! These types are backend-agnostic and used across all model implementations.

use serde::{Deserialize, Serialize};

/// A function the model is asked to call instead of answering in free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub parameters: serde_json::Value,
}

/// A single-turn request: one user message, optionally constrained to a function
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub function: Option<FunctionSpec>,
}

impl InferenceRequest {
    /// Free-text request
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            function: None,
        }
    }

    /// Request constrained to a function call
    pub fn with_function(prompt: impl Into<String>, function: FunctionSpec) -> Self {
        Self {
            prompt: prompt.into(),
            function: Some(function),
        }
    }
}
