//! Domain models for autocat

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A bill as listed by Firefly III
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub amount_min: f64,
    pub amount_max: f64,
    pub notes: Option<String>,
    pub active: bool,
}

impl Bill {
    /// Whether an amount (sign ignored) falls inside this bill's range
    pub fn covers(&self, amount: f64) -> bool {
        let amount = amount.abs();
        amount >= self.amount_min && amount <= self.amount_max
    }
}

/// The allowed categories, budgets and bills at classification time
///
/// Fetched fresh for every classification and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    /// Category name -> id
    pub categories: HashMap<String, String>,
    /// Budget name -> id
    pub budgets: HashMap<String, String>,
    /// Bill name -> bill
    pub bills: HashMap<String, Bill>,
}

impl OptionSet {
    pub fn category_names(&self) -> Vec<&str> {
        sorted_keys(&self.categories)
    }

    pub fn budget_names(&self) -> Vec<&str> {
        sorted_keys(&self.budgets)
    }

    pub fn bill_names(&self) -> Vec<&str> {
        sorted_keys(&self.bills)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

/// One split of a Firefly III transaction group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction_journal_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A transaction group to classify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction group id
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub destination_name: Option<String>,
    pub journals: Vec<JournalEntry>,
}

/// Answer extracted from the model before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelAnswer {
    pub destination: Option<String>,
    pub category: String,
    pub budget: Option<String>,
    pub bill: Option<String>,
}

/// A validated classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Merchant-style destination name
    pub destination: Option<String>,
    /// Always a member of the fetched category names
    pub category: String,
    pub budget: Option<String>,
    pub bill: Option<String>,
    /// Rendered prompt, kept for auditing
    pub prompt: String,
    /// Raw provider response
    pub response: serde_json::Value,
}

/// Identifiers written back to the ledger
///
/// Absent fields are left out of the update entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
}

/// Raw model output
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Provider response body as received
    pub raw: serde_json::Value,
    /// Message text, or function-call arguments when a function was requested
    pub content: String,
}

/// How the model is asked to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStrategy {
    /// Inline JSON object with destination, bill, budget, category
    #[default]
    Json,
    /// A single category name as plain text
    Label,
    /// Structured function call
    Function,
}

impl PromptStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Label => "label",
            Self::Function => "function",
        }
    }
}

impl std::str::FromStr for PromptStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "label" | "text" => Ok(Self::Label),
            "function" | "function_call" | "tools" => Ok(Self::Function),
            _ => Err(format!("Unknown prompt strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which mismatches reject a whole transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Only an unknown category rejects; unknown budget/bill are dropped
    #[default]
    CategoryOnly,
    /// An unknown category or an unknown non-empty budget rejects
    CategoryAndBudget,
}

impl RejectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryOnly => "category",
            Self::CategoryAndBudget => "category_and_budget",
        }
    }
}

impl std::str::FromStr for RejectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" | "category_only" => Ok(Self::CategoryOnly),
            "category_and_budget" | "strict" => Ok(Self::CategoryAndBudget),
            _ => Err(format!("Unknown rejection policy: {}", s)),
        }
    }
}

impl std::fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Firefly III sends amounts as decimal strings; accept numbers too
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
        Missing(()),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) if s.trim().is_empty() => Ok(0.0),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Amount::Missing(()) => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_covers_amount_range() {
        let rent = Bill {
            id: "3".into(),
            amount_min: 1000.0,
            amount_max: 1200.0,
            notes: None,
            active: true,
        };
        assert!(rent.covers(1100.0));
        assert!(rent.covers(-1100.0));
        assert!(rent.covers(1000.0));
        assert!(!rent.covers(1200.01));
    }

    #[test]
    fn test_option_set_names_sorted() {
        let mut options = OptionSet::default();
        options.categories.insert("Vacation".into(), "2".into());
        options.categories.insert("Groceries".into(), "1".into());
        assert_eq!(options.category_names(), vec!["Groceries", "Vacation"]);
        assert!(options.budget_names().is_empty());
    }

    #[test]
    fn test_resolved_ids_omit_absent_fields() {
        let ids = ResolvedIds {
            category_id: Some("7".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&ids).unwrap();
        assert_eq!(json, serde_json::json!({"category_id": "7"}));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("JSON".parse::<PromptStrategy>(), Ok(PromptStrategy::Json));
        assert_eq!("label".parse::<PromptStrategy>(), Ok(PromptStrategy::Label));
        assert_eq!(
            "function_call".parse::<PromptStrategy>(),
            Ok(PromptStrategy::Function)
        );
        assert!("xml".parse::<PromptStrategy>().is_err());
    }

    #[test]
    fn test_rejection_policy_from_str() {
        assert_eq!(
            "category".parse::<RejectionPolicy>(),
            Ok(RejectionPolicy::CategoryOnly)
        );
        assert_eq!(
            "category_and_budget".parse::<RejectionPolicy>(),
            Ok(RejectionPolicy::CategoryAndBudget)
        );
    }

    #[test]
    fn test_deserialize_amount_string_or_number() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "deserialize_amount")]
            amount: f64,
        }

        let row: Row = serde_json::from_str(r#"{"amount": "1100.50"}"#).unwrap();
        assert_eq!(row.amount, 1100.5);
        let row: Row = serde_json::from_str(r#"{"amount": 42}"#).unwrap();
        assert_eq!(row.amount, 42.0);
        let row: Row = serde_json::from_str(r#"{"amount": null}"#).unwrap();
        assert_eq!(row.amount, 0.0);
    }
}
