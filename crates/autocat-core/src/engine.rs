//! Transaction classification engine
//!
//! Runs one transaction through fetch → prompt → infer → parse → validate → apply.
//! Ledger and model errors abort the run and propagate. An answer whose category
//! is not one of the ledger's categories is not an error: it is logged and the
//! run ends with `Ok(None)` without touching the ledger.
//!
//! Option sets are fetched on every run and never shared between runs, so
//! overlapping calls on the same engine need no locking.

use tracing::{debug, info, warn};

use crate::ai::parsing::parse_answer;
use crate::ai::{InferenceRequest, ModelBackend, ModelClient};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::LedgerClient;
use crate::models::{
    ClassificationResult, ModelAnswer, OptionSet, PromptStrategy, RejectionPolicy, ResolvedIds,
    Transaction,
};
use crate::prompts::{build_request, PromptLibrary};

/// A validated classification together with the ids to write
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub result: ClassificationResult,
    pub ids: ResolvedIds,
}

/// Outcome of checking a model answer against the option sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Category known; unknown budget/bill already dropped
    Accepted { answer: ModelAnswer, ids: ResolvedIds },
    /// The answer cannot be applied
    Rejected { field: &'static str, guess: String },
}

/// Classifies transactions and writes the result back to Firefly III
#[derive(Clone)]
pub struct ClassificationEngine {
    ledger: LedgerClient,
    model: ModelClient,
    prompts: PromptLibrary,
    strategy: PromptStrategy,
    rejection: RejectionPolicy,
}

impl ClassificationEngine {
    /// Create an engine using the JSON strategy and category-only rejection
    pub fn new(ledger: LedgerClient, model: ModelClient, prompts: PromptLibrary) -> Self {
        Self {
            ledger,
            model,
            prompts,
            strategy: PromptStrategy::default(),
            rejection: RejectionPolicy::default(),
        }
    }

    /// Build the engine and its clients from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let prompts = PromptLibrary::from_config_dir(config.classification.prompts_dir.clone())?;

        Ok(Self::new(
            LedgerClient::from_config(&config.ledger),
            ModelClient::from_config(config),
            prompts,
        )
        .with_strategy(config.classification.strategy)
        .with_rejection_policy(config.classification.rejection))
    }

    pub fn with_strategy(mut self, strategy: PromptStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_rejection_policy(mut self, rejection: RejectionPolicy) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    pub fn model(&self) -> &ModelClient {
        &self.model
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    pub fn strategy(&self) -> PromptStrategy {
        self.strategy
    }

    /// Classify a transaction and write the result to the ledger
    ///
    /// Returns `Ok(None)` when the model's answer was rejected.
    pub async fn classify(&self, transaction: &Transaction) -> Result<Option<ClassificationResult>> {
        let Some(resolution) = self.resolve(transaction).await? else {
            return Ok(None);
        };

        self.ledger
            .apply_classification(&transaction.id, &transaction.journals, &resolution.ids)
            .await?;

        info!(
            transaction_id = %transaction.id,
            category = %resolution.result.category,
            budget = resolution.result.budget.as_deref(),
            bill = resolution.result.bill.as_deref(),
            "Transaction classified"
        );
        Ok(Some(resolution.result))
    }

    /// Load a transaction from the ledger and classify it
    pub async fn classify_by_id(&self, id: &str) -> Result<Option<ClassificationResult>> {
        let transaction = self.ledger.get_transaction(id).await?;
        self.classify(&transaction).await
    }

    /// Everything up to and including validation, without writing
    pub async fn resolve(&self, transaction: &Transaction) -> Result<Option<Resolution>> {
        let options = self.ledger.fetch_options().await?;
        let request = self.request_for(&options, transaction)?;

        let completion = self.model.infer(&request).await?;
        debug!(transaction_id = %transaction.id, content = %completion.content, "Model answered");

        let answer = parse_answer(self.strategy, &completion.content)?;

        match validate(answer, &options, self.rejection) {
            Verdict::Accepted { answer, ids } => {
                if let Some(bill) = answer.bill.as_deref().and_then(|b| options.bills.get(b)) {
                    if !bill.covers(transaction.amount) {
                        info!(
                            transaction_id = %transaction.id,
                            bill = answer.bill.as_deref(),
                            amount = transaction.amount,
                            "Bill chosen outside its amount range"
                        );
                    }
                }
                Ok(Some(Resolution {
                    result: ClassificationResult {
                        destination: answer.destination,
                        category: answer.category,
                        budget: answer.budget,
                        bill: answer.bill,
                        prompt: request.prompt,
                        response: completion.raw,
                    },
                    ids,
                }))
            }
            Verdict::Rejected { field, guess } => {
                warn!(
                    transaction_id = %transaction.id,
                    field,
                    "Model could not classify the transaction.\nPrompt: {}\nModel's guess: {}",
                    request.prompt,
                    guess
                );
                Ok(None)
            }
        }
    }

    /// The request that would be sent for a transaction, with fresh option sets
    pub async fn preview_request(&self, transaction: &Transaction) -> Result<InferenceRequest> {
        let options = self.ledger.fetch_options().await?;
        self.request_for(&options, transaction)
    }

    fn request_for(&self, options: &OptionSet, transaction: &Transaction) -> Result<InferenceRequest> {
        build_request(&self.prompts, self.strategy, options, transaction)
    }
}

/// Check an answer against the option sets and resolve names to ids
///
/// The category must match a category name exactly. Blank budget/bill mean
/// none; unknown ones are dropped, except that `CategoryAndBudget` rejects an
/// unknown budget.
pub fn validate(answer: ModelAnswer, options: &OptionSet, policy: RejectionPolicy) -> Verdict {
    let Some(category_id) = options.categories.get(&answer.category) else {
        return Verdict::Rejected {
            field: "category",
            guess: answer.category,
        };
    };

    let budget_id = match answer.budget.as_deref() {
        None => None,
        Some(name) => match options.budgets.get(name) {
            Some(id) => Some(id.clone()),
            None if policy == RejectionPolicy::CategoryAndBudget => {
                return Verdict::Rejected {
                    field: "budget",
                    guess: name.to_string(),
                };
            }
            None => {
                info!(budget = name, "Budget not in allowed set, leaving unset");
                None
            }
        },
    };

    let bill_id = match answer.bill.as_deref() {
        None => None,
        Some(name) => match options.bills.get(name) {
            Some(bill) => Some(bill.id.clone()),
            None => {
                info!(bill = name, "Bill not in allowed set, leaving unset");
                None
            }
        },
    };

    let ids = ResolvedIds {
        destination_name: answer.destination.clone(),
        category_id: Some(category_id.clone()),
        budget_id,
        bill_id,
    };

    let answer = ModelAnswer {
        budget: answer.budget.filter(|_| ids.budget_id.is_some()),
        bill: answer.bill.filter(|_| ids.bill_id.is_some()),
        ..answer
    };

    Verdict::Accepted { answer, ids }
}
