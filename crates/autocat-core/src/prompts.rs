//! Classification prompts
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/autocat/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt strategy has its own template. `build_request` renders the
//! template for one transaction and, for the function strategy, attaches the
//! `classify_transaction` schema with the allowed values spelled out.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::json;

use crate::ai::types::{FunctionSpec, InferenceRequest};
use crate::error::{Error, Result};
use crate::models::{OptionSet, PromptStrategy, Transaction};

/// Name of the function offered to the model in function-call mode
pub const CLASSIFY_FUNCTION: &str = "classify_transaction";

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CLASSIFY_JSON: &str = include_str!("../../../prompts/classify_json.md");
    pub const CLASSIFY_LABEL: &str = include_str!("../../../prompts/classify_label.md");
    pub const CLASSIFY_FUNCTION: &str = include_str!("../../../prompts/classify_function.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    ClassifyJson,
    ClassifyLabel,
    ClassifyFunction,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyJson => "classify_json",
            Self::ClassifyLabel => "classify_label",
            Self::ClassifyFunction => "classify_function",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::ClassifyJson, Self::ClassifyLabel, Self::ClassifyFunction]
    }

    /// The prompt used by a strategy
    pub fn for_strategy(strategy: PromptStrategy) -> Self {
        match strategy {
            PromptStrategy::Json => Self::ClassifyJson,
            PromptStrategy::Label => Self::ClassifyLabel,
            PromptStrategy::Function => Self::ClassifyFunction,
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ClassifyJson => defaults::CLASSIFY_JSON,
            Self::ClassifyLabel => defaults::CLASSIFY_LABEL,
            Self::ClassifyFunction => defaults::CLASSIFY_FUNCTION,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Strategy the prompt is written for
    pub strategy: PromptStrategy,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the user section (or the whole body) with template variables replaced
    ///
    /// Conditionals are resolved on the template first; substituted values are
    /// inserted verbatim and never read as template syntax.
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        let template = self.user_section().unwrap_or(&self.content);
        substitute_vars(&remove_unmatched_conditionals(template, vars), vars)
    }
}

/// Loaded classification prompts
///
/// All prompts are read once at construction; the library is read-only afterwards.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    prompts: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Load prompts using the default override directory
    pub fn new() -> Result<Self> {
        Self::load(default_prompts_dir())
    }

    /// Load prompts with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Use the configured override directory, else the default one
    pub fn from_config_dir(dir: Option<PathBuf>) -> Result<Self> {
        match dir {
            Some(dir) => Self::with_override_dir(dir),
            None => Self::new(),
        }
    }

    /// Embedded prompts only
    pub fn embedded_only() -> Result<Self> {
        Self::load(None)
    }

    fn load(override_dir: Option<PathBuf>) -> Result<Self> {
        let mut prompts = HashMap::new();
        for &id in PromptId::all() {
            prompts.insert(id, load_prompt(override_dir.as_ref(), id)?);
        }
        Ok(Self {
            override_dir,
            prompts,
        })
    }

    /// Get a prompt by ID
    pub fn get(&self, id: PromptId) -> Result<&Prompt> {
        self.prompts
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    /// List all prompts with their override status
    pub fn list(&self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .filter_map(|id| self.prompts.get(id))
            .map(|p| PromptInfo {
                id: p.metadata.id.clone(),
                version: p.metadata.version,
                strategy: p.metadata.strategy,
                has_override: p.is_override,
                override_path: p.override_path.clone(),
            })
            .collect()
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

fn load_prompt(override_dir: Option<&PathBuf>, id: PromptId) -> Result<Prompt> {
    if let Some(dir) = override_dir {
        let override_path = dir.join(format!("{}.md", id.as_str()));
        if override_path.exists() {
            let content = fs::read_to_string(&override_path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(override_path),
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        is_override: false,
        override_path: None,
    })
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub strategy: PromptStrategy,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("autocat").join("prompts").join("overrides"))
}

/// Build the model request for one transaction
pub fn build_request(
    library: &PromptLibrary,
    strategy: PromptStrategy,
    options: &OptionSet,
    transaction: &Transaction,
) -> Result<InferenceRequest> {
    let prompt = library.get(PromptId::for_strategy(strategy))?;

    let categories = options.category_names().join(", ");
    let budgets = options.budget_names().join(", ");
    let bills = render_bills(options);
    let amount = format!("{:.2}", transaction.amount);
    let destination = transaction.destination_name.as_deref().unwrap_or("");

    let mut vars = HashMap::new();
    vars.insert("description", transaction.description.as_str());
    vars.insert("amount", amount.as_str());
    vars.insert("destination", destination);
    vars.insert("categories", categories.as_str());
    vars.insert("budgets", budgets.as_str());
    vars.insert("bills", bills.as_str());

    let text = prompt.render_user(&vars);

    Ok(match strategy {
        PromptStrategy::Function => InferenceRequest::with_function(text, classify_function(options)),
        PromptStrategy::Json | PromptStrategy::Label => InferenceRequest::text(text),
    })
}

/// One line per bill with its expected range and notes
fn render_bills(options: &OptionSet) -> String {
    let lines: Vec<String> = options
        .bill_names()
        .into_iter()
        .filter_map(|name| options.bills.get(name).map(|bill| (name, bill)))
        .map(|(name, bill)| {
            let mut line = format!(
                "- {} (amount_min: {:.2}, amount_max: {:.2}",
                name, bill.amount_min, bill.amount_max
            );
            if let Some(notes) = bill.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                line.push_str(&format!(", notes: {}", notes.trim()));
            }
            if !bill.active {
                line.push_str(", inactive");
            }
            line.push(')');
            line
        })
        .collect();

    if lines.is_empty() {
        "- (no bills)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Schema of the `classify_transaction` function with allowed values embedded
pub fn classify_function(options: &OptionSet) -> FunctionSpec {
    let bills = options
        .bill_names()
        .into_iter()
        .filter_map(|name| options.bills.get(name).map(|bill| (name, bill)))
        .map(|(name, bill)| format!("{} ({:.2} to {:.2})", name, bill.amount_min, bill.amount_max))
        .collect::<Vec<_>>()
        .join(", ");

    FunctionSpec {
        name: CLASSIFY_FUNCTION.to_string(),
        description: "Record the classification of a financial transaction".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "destination": {
                    "type": "string",
                    "description": "Simple merchant name, most likely the name of a familiar business"
                },
                "bill": {
                    "type": "string",
                    "description": format!(
                        "A blank string or exactly one of these bills, chosen only when the amount fits its range: {}",
                        bills
                    )
                },
                "budget": {
                    "type": "string",
                    "description": format!(
                        "A blank string or exactly one of these budgets: {}",
                        options.budget_names().join(", ")
                    )
                },
                "category": {
                    "type": "string",
                    "description": format!(
                        "Exactly one of these categories: {}",
                        options.category_names().join(", ")
                    )
                }
            },
            "required": ["destination", "bill", "budget", "category"]
        }),
    }
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Replace `{{var}}` tokens in a single left-to-right pass
///
/// Unknown names are left as written.
fn substitute_vars(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            result.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let name = &after_open[..close];
        match vars.get(name) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[open..open + close + 4]),
        }
        rest = &after_open[close + 2..];
    }

    result.push_str(rest);
    result
}

/// Resolve `{{#if var}}...{{/if}}` blocks: keep the body when `var` is non-empty
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = &result[var_start..var_start + var_end];
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_content = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let should_include = vars.get(var_name).is_some_and(|v| !v.is_empty());

        result = if should_include {
            format!(
                "{}{}{}",
                &result[..if_start],
                block_content,
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bill, JournalEntry};

    fn options() -> OptionSet {
        let mut options = OptionSet::default();
        options.categories.insert("Groceries".into(), "1".into());
        options.categories.insert("Vacation".into(), "2".into());
        options.budgets.insert("Travel".into(), "5".into());
        options.bills.insert(
            "Rent".into(),
            Bill {
                id: "3".into(),
                amount_min: 1000.0,
                amount_max: 1200.0,
                notes: Some("Apartment, paid monthly".into()),
                active: true,
            },
        );
        options
    }

    fn transaction(description: &str, amount: f64) -> Transaction {
        Transaction {
            id: "10".into(),
            description: description.into(),
            amount,
            destination_name: None,
            journals: vec![JournalEntry {
                transaction_journal_id: "11".into(),
                tags: vec![],
            }],
        }
    }

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
strategy: label
---

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.strategy, PromptStrategy::Label);
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User").is_err());
    }

    #[test]
    fn test_conditional_blocks() {
        let content = "Start{{#if destination}}\nDestination: {{destination}}{{/if}}\nEnd";

        let mut vars = HashMap::new();
        vars.insert("destination", "Airbnb");
        let result = remove_unmatched_conditionals(content, &vars);
        assert!(result.contains("Destination: {{destination}}"));

        let mut vars = HashMap::new();
        vars.insert("destination", "");
        let result = remove_unmatched_conditionals(content, &vars);
        assert!(!result.contains("Destination:"));
        assert!(result.contains("Start"));
        assert!(result.contains("End"));
    }

    #[test]
    fn test_substitute_vars_single_pass() {
        let mut vars = HashMap::new();
        vars.insert("description", "{{categories}}");
        vars.insert("categories", "Groceries");

        let result = substitute_vars("{{description}} / {{categories}} / {{unknown}}", &vars);
        assert_eq!(result, "{{categories}} / Groceries / {{unknown}}");
        assert_eq!(substitute_vars("open {{description", &vars), "open {{description");
    }

    #[test]
    fn test_description_with_conditional_syntax_is_literal() {
        let library = PromptLibrary::embedded_only().unwrap();
        let request = build_request(
            &library,
            PromptStrategy::Json,
            &options(),
            &transaction("REFUND {{#if x}}", 250.0),
        )
        .unwrap();

        assert!(request
            .prompt
            .contains(r#"description of "REFUND {{#if x}}" and an amount of 250.00."#));
    }

    #[test]
    fn test_description_with_variable_syntax_renders_deterministically() {
        let library = PromptLibrary::embedded_only().unwrap();
        let tx = transaction("{{categories}}", 9.99);

        let prompts: std::collections::HashSet<String> = (0..50)
            .map(|_| {
                build_request(&library, PromptStrategy::Label, &options(), &tx)
                    .unwrap()
                    .prompt
            })
            .collect();

        assert_eq!(prompts.len(), 1);
        let prompt = prompts.into_iter().next().unwrap();
        assert!(prompt.contains(r#"Transaction description: "{{categories}}""#));
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, body) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
            assert_eq!(PromptId::for_strategy(metadata.strategy), *id);
            assert!(body.contains("{{description}}"));
        }
    }

    #[test]
    fn test_json_prompt_lists_options() {
        let library = PromptLibrary::embedded_only().unwrap();
        let request = build_request(
            &library,
            PromptStrategy::Json,
            &options(),
            &transaction("AIRBNB HOUSE", 250.0),
        )
        .unwrap();

        assert!(request.function.is_none());
        assert!(request.prompt.contains("Groceries, Vacation"));
        assert!(request.prompt.contains("Travel"));
        assert!(request
            .prompt
            .contains("- Rent (amount_min: 1000.00, amount_max: 1200.00, notes: Apartment, paid monthly)"));
        assert!(request.prompt.contains("amount_min to amount_max"));
        assert!(request.prompt.contains(r#"description of "AIRBNB HOUSE""#));
        assert!(request.prompt.contains("250.00"));
        assert!(!request.prompt.contains("{{"));
        assert!(!request.prompt.contains("names the destination"));
    }

    #[test]
    fn test_label_prompt_includes_destination_when_known() {
        let library = PromptLibrary::embedded_only().unwrap();
        let mut tx = transaction("POS 4411 TESCO", 12.5);
        tx.destination_name = Some("Tesco".into());

        let request = build_request(&library, PromptStrategy::Label, &options(), &tx).unwrap();
        assert!(request.function.is_none());
        assert!(request.prompt.contains("Groceries, Vacation"));
        assert!(request.prompt.contains(r#"Destination: "Tesco""#));
    }

    #[test]
    fn test_bill_range_instruction_follows_strategy() {
        let library = PromptLibrary::embedded_only().unwrap();
        let tx = transaction("RENT OCT", 1100.0);

        for strategy in [PromptStrategy::Json, PromptStrategy::Function] {
            let request = build_request(&library, strategy, &options(), &tx).unwrap();
            assert!(
                request.prompt.contains("amount_min to amount_max range"),
                "{strategy} prompt lacks the bill range rule"
            );
        }

        let label = build_request(&library, PromptStrategy::Label, &options(), &tx).unwrap();
        assert!(!label.prompt.contains("Rent"));
        assert!(!label.prompt.contains("bill"));
    }

    #[test]
    fn test_function_request_has_schema() {
        let library = PromptLibrary::embedded_only().unwrap();
        let request = build_request(
            &library,
            PromptStrategy::Function,
            &options(),
            &transaction("RENT OCT", 1100.0),
        )
        .unwrap();

        let function = request.function.expect("function spec");
        assert_eq!(function.name, CLASSIFY_FUNCTION);
        let params = &function.parameters;
        assert_eq!(
            params["required"],
            json!(["destination", "bill", "budget", "category"])
        );
        for key in ["destination", "bill", "budget", "category"] {
            assert_eq!(params["properties"][key]["type"], "string");
        }
        let category = params["properties"]["category"]["description"]
            .as_str()
            .unwrap();
        assert!(category.contains("Groceries, Vacation"));
        let bill = params["properties"]["bill"]["description"].as_str().unwrap();
        assert!(bill.contains("Rent (1000.00 to 1200.00)"));
        assert!(request.prompt.contains("classify_transaction"));
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("classify_label.md"),
            "---\nid: classify_label\nversion: 2\nstrategy: label\n---\n\n# User\nPick one of {{categories}} for {{description}}",
        )
        .unwrap();

        let library = PromptLibrary::with_override_dir(dir.path().to_path_buf()).unwrap();
        let label = library.get(PromptId::ClassifyLabel).unwrap();
        assert!(label.is_override);
        assert_eq!(label.metadata.version, 2);
        assert!(!library.get(PromptId::ClassifyJson).unwrap().is_override);

        let request = build_request(
            &library,
            PromptStrategy::Label,
            &options(),
            &transaction("TESCO", 3.0),
        )
        .unwrap();
        assert_eq!(request.prompt, "Pick one of Groceries, Vacation for TESCO");

        let listed = library.list();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed.iter().filter(|p| p.has_override).count(), 1);
    }
}
