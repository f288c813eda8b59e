//! Firefly III REST client
//!
//! Reads the option sets (categories, budgets, bills) and writes classifications
//! back to transaction groups. Every non-2xx response becomes `Error::Ledger`;
//! nothing is retried.

use std::collections::HashMap;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::models::{deserialize_amount, Bill, JournalEntry, OptionSet, ResolvedIds, Transaction};

/// Firefly III API client
#[derive(Clone)]
pub struct LedgerClient {
    http_client: Client,
    base_url: String,
    token: String,
    tag: String,
}

impl LedgerClient {
    /// Create a new client
    pub fn new(base_url: &str, token: &str, tag: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            tag: tag.to_string(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(&config.url, &config.token, &config.tag)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Marker tag appended on write-back
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Category name -> id
    pub async fn list_categories(&self) -> Result<HashMap<String, String>> {
        debug!("Getting categories");
        let rows: Vec<Resource<NamedAttributes>> = self.list("categories").await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.attributes.name, row.id))
            .collect())
    }

    /// Budget name -> id
    pub async fn list_budgets(&self) -> Result<HashMap<String, String>> {
        debug!("Getting budgets");
        let rows: Vec<Resource<NamedAttributes>> = self.list("budgets").await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.attributes.name, row.id))
            .collect())
    }

    /// Bill name -> bill details
    pub async fn list_bills(&self) -> Result<HashMap<String, Bill>> {
        debug!("Getting bills");
        let rows: Vec<Resource<BillAttributes>> = self.list("bills").await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let attrs = row.attributes;
                (
                    attrs.name,
                    Bill {
                        id: row.id,
                        amount_min: attrs.amount_min,
                        amount_max: attrs.amount_max,
                        notes: attrs.notes,
                        active: attrs.active,
                    },
                )
            })
            .collect())
    }

    /// Fetch all three option sets, one after another
    pub async fn fetch_options(&self) -> Result<OptionSet> {
        let categories = self.list_categories().await?;
        let budgets = self.list_budgets().await?;
        let bills = self.list_bills().await?;
        Ok(OptionSet {
            categories,
            budgets,
            bills,
        })
    }

    /// Load a transaction group by id
    ///
    /// Description, amount and destination come from the first split.
    pub async fn get_transaction(&self, id: &str) -> Result<Transaction> {
        let url = format!("{}/api/v1/transactions/{}", self.base_url, id);
        let response = self.send(self.http_client.get(&url)).await?;
        let group: Single<TransactionGroupAttributes> = response.json().await?;

        let splits = group.data.attributes.transactions;
        let first = splits
            .first()
            .ok_or_else(|| Error::NotFound(format!("Transaction {} has no splits", id)))?;

        Ok(Transaction {
            id: group.data.id,
            description: first.description.clone(),
            amount: first.amount,
            destination_name: first.destination_name.clone(),
            journals: splits
                .iter()
                .map(|split| JournalEntry {
                    transaction_journal_id: split.transaction_journal_id.clone(),
                    tags: split.tags.clone().unwrap_or_default(),
                })
                .collect(),
        })
    }

    /// Write a classification to every journal entry of a transaction
    ///
    /// The marker tag is appended to each entry's existing tags. Fields absent
    /// from `ids` are omitted from the request. One PUT covers all entries.
    pub async fn apply_classification(
        &self,
        transaction_id: &str,
        journals: &[JournalEntry],
        ids: &ResolvedIds,
    ) -> Result<()> {
        let body = UpdateTransactionRequest {
            apply_rules: true,
            fire_webhooks: true,
            transactions: journals
                .iter()
                .map(|journal| {
                    let mut tags = journal.tags.clone();
                    tags.push(self.tag.clone());
                    JournalUpdate {
                        transaction_journal_id: &journal.transaction_journal_id,
                        tags,
                        ids,
                    }
                })
                .collect(),
        };
        debug!(transaction_id, body = ?serde_json::to_string(&body).ok(), "Putting transaction");

        let url = format!("{}/api/v1/transactions/{}", self.base_url, transaction_id);
        let response = self.send(self.http_client.put(&url).json(&body)).await?;
        // Body is the updated group; only success matters here
        let _ = response.bytes().await?;

        info!(transaction_id, journals = journals.len(), "Transaction updated");
        Ok(())
    }

    /// Check that the API answers with the configured token
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/v1/about", self.base_url);
        match self.authorized(self.http_client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Fetch every page of a list endpoint
    async fn list<A: DeserializeOwned>(&self, resource: &str) -> Result<Vec<Resource<A>>> {
        let mut rows = Vec::new();
        let mut page = 1u32;

        loop {
            let url = format!("{}/api/v1/{}", self.base_url, resource);
            let response = self
                .send(self.http_client.get(&url).query(&[("page", page)]))
                .await?;
            let list: List<A> = response.json().await?;
            let fetched = list.data.len();
            rows.extend(list.data);

            let Some(p) = list.meta.and_then(|m| m.pagination) else {
                break;
            };
            if p.current_page >= p.total_pages {
                break;
            }
            // Stop when the server repeats a page instead of advancing
            if p.current_page < page || fetched == 0 {
                warn!(
                    resource,
                    page,
                    reported = p.current_page,
                    "Pagination did not advance, stopping"
                );
                break;
            }
            page = p.current_page + 1;
        }

        debug!(resource, count = rows.len(), "Listed resources");
        Ok(rows)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    /// Send a request and turn any non-success status into `Error::Ledger`
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.authorized(builder).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Ledger { status, url, body })
    }
}

/// JSON:API list envelope
#[derive(Debug, Deserialize)]
struct List<A> {
    data: Vec<Resource<A>>,
    #[serde(default)]
    meta: Option<Meta>,
}

/// JSON:API single-object envelope
#[derive(Debug, Deserialize)]
struct Single<A> {
    data: Resource<A>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    id: String,
    attributes: A,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    current_page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct NamedAttributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BillAttributes {
    name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    amount_min: f64,
    #[serde(default, deserialize_with = "deserialize_amount")]
    amount_max: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TransactionGroupAttributes {
    transactions: Vec<SplitAttributes>,
}

#[derive(Debug, Deserialize)]
struct SplitAttributes {
    transaction_journal_id: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    amount: f64,
    #[serde(default)]
    destination_name: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Body of `PUT /api/v1/transactions/{id}`
#[derive(Debug, Serialize)]
struct UpdateTransactionRequest<'a> {
    apply_rules: bool,
    fire_webhooks: bool,
    transactions: Vec<JournalUpdate<'a>>,
}

#[derive(Debug, Serialize)]
struct JournalUpdate<'a> {
    transaction_journal_id: &'a str,
    tags: Vec<String>,
    #[serde(flatten)]
    ids: &'a ResolvedIds,
}
