//! Parsing of model answers
//!
//! One function per prompt strategy. Each turns raw model output into a
//! `ModelAnswer` or fails with a model error; nothing downstream looks at the
//! raw text again. Membership in the option sets is checked by the engine.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{ModelAnswer, PromptStrategy};

/// Answer object as produced by the JSON and function strategies
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnswer {
    destination: Option<String>,
    category: Option<String>,
    budget: Option<String>,
    bill: Option<String>,
}

impl From<RawAnswer> for ModelAnswer {
    fn from(raw: RawAnswer) -> Self {
        ModelAnswer {
            destination: non_blank(raw.destination),
            category: raw.category.unwrap_or_default(),
            budget: non_blank(raw.budget),
            bill: non_blank(raw.bill),
        }
    }
}

/// Parse a completion according to the active strategy
pub fn parse_answer(strategy: PromptStrategy, content: &str) -> Result<ModelAnswer> {
    match strategy {
        PromptStrategy::Json => parse_json_answer(content),
        PromptStrategy::Label => parse_label_answer(content),
        PromptStrategy::Function => parse_function_arguments(content),
    }
}

/// JSON object embedded in free text (models often wrap it in prose or fences)
pub fn parse_json_answer(content: &str) -> Result<ModelAnswer> {
    let content = content.trim();
    let start = content.find('{');
    let end = content.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &content[s..=e];
            let raw: RawAnswer = serde_json::from_str(json_str).map_err(|e| {
                Error::model(format!(
                    "Invalid JSON from model: {} | Raw: {}",
                    e,
                    truncate(json_str)
                ))
            })?;
            Ok(raw.into())
        }
        _ => Err(Error::model(format!(
            "No JSON found in model response | Raw: {}",
            truncate(content)
        ))),
    }
}

/// A bare category name; surrounding whitespace and quotes are not part of it
pub fn parse_label_answer(content: &str) -> Result<ModelAnswer> {
    let label = content
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();

    Ok(ModelAnswer {
        category: label.to_string(),
        ..Default::default()
    })
}

/// Function-call arguments: must be a JSON object on its own
pub fn parse_function_arguments(arguments: &str) -> Result<ModelAnswer> {
    let raw: RawAnswer = serde_json::from_str(arguments.trim()).map_err(|e| {
        Error::model(format!(
            "Invalid function arguments from model: {} | Raw: {}",
            e,
            truncate(arguments)
        ))
    })?;
    Ok(raw.into())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
