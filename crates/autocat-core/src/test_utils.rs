//! Test utilities for autocat-core
//!
//! Mock Firefly III and chat-completions servers that record every request
//! they receive, for unit and integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::models::Transaction;

/// A request seen by a mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct LedgerState {
    categories: Vec<(String, String)>,
    budgets: Vec<(String, String)>,
    bills: Vec<Value>,
    transactions: HashMap<String, Transaction>,
    failures: HashMap<String, u16>,
    page_size: Option<usize>,
    ignore_page_param: bool,
    requests: Vec<RecordedRequest>,
}

type SharedLedger = Arc<Mutex<LedgerState>>;

/// Builder for `MockLedgerServer`
#[derive(Default)]
pub struct MockLedgerBuilder {
    state: LedgerState,
}

impl MockLedgerBuilder {
    pub fn category(mut self, id: &str, name: &str) -> Self {
        self.state.categories.push((id.into(), name.into()));
        self
    }

    pub fn budget(mut self, id: &str, name: &str) -> Self {
        self.state.budgets.push((id.into(), name.into()));
        self
    }

    /// Add a bill; amounts are sent as strings like Firefly III does
    pub fn bill(mut self, id: &str, name: &str, amount_min: f64, amount_max: f64) -> Self {
        self.state.bills.push(json!({
            "type": "bills",
            "id": id,
            "attributes": {
                "name": name,
                "amount_min": format!("{:.2}", amount_min),
                "amount_max": format!("{:.2}", amount_max),
                "notes": null,
                "active": true
            }
        }));
        self
    }

    pub fn transaction(mut self, transaction: Transaction) -> Self {
        self.state
            .transactions
            .insert(transaction.id.clone(), transaction);
        self
    }

    /// Answer every request to `path` with `status`
    pub fn fail(mut self, path: &str, status: u16) -> Self {
        self.state.failures.insert(path.into(), status);
        self
    }

    /// Split list responses into pages of `size`
    pub fn page_size(mut self, size: usize) -> Self {
        self.state.page_size = Some(size);
        self
    }

    /// Always serve the first page, whatever `?page` asks for
    pub fn ignore_page_param(mut self) -> Self {
        self.state.ignore_page_param = true;
        self
    }

    pub async fn start(self) -> MockLedgerServer {
        let state = Arc::new(Mutex::new(self.state));
        let app = Router::new()
            .route("/api/v1/about", get(handle_about))
            .route("/api/v1/categories", get(handle_categories))
            .route("/api/v1/budgets", get(handle_budgets))
            .route("/api/v1/bills", get(handle_bills))
            .route(
                "/api/v1/transactions/:id",
                get(handle_get_transaction).put(handle_put_transaction),
            )
            .with_state(state.clone());

        let (addr, shutdown_tx) = serve(app).await;
        MockLedgerServer {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }
}

/// Mock Firefly III server
pub struct MockLedgerServer {
    addr: SocketAddr,
    state: SharedLedger,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLedgerServer {
    pub fn builder() -> MockLedgerBuilder {
        MockLedgerBuilder::default()
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// (transaction id, body) of every PUT received
    pub fn puts(&self) -> Vec<(String, Value)> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "PUT")
            .filter_map(|r| {
                let id = r.path.rsplit('/').next()?.to_string();
                Some((id, r.body?))
            })
            .collect()
    }

    /// Current state of a stored transaction
    pub fn transaction(&self, id: &str) -> Option<Transaction> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.transactions.get(id).cloned())
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLedgerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

/// Record the request and return the configured failure, if any
fn record(
    state: &SharedLedger,
    method: &str,
    path: &str,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Option<Response> {
    let mut state = state.lock().ok()?;
    state.requests.push(RecordedRequest {
        method: method.to_string(),
        path: path.to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    state.failures.get(path).map(|&status| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, r#"{"message":"Unauthenticated."}"#).into_response()
    })
}

fn paged(rows: Vec<Value>, page_size: Option<usize>, page: usize) -> Value {
    let total = rows.len();
    let per_page = page_size.unwrap_or(total.max(1));
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let data: Vec<Value> = rows
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    let count = data.len();

    json!({
        "data": data,
        "meta": {"pagination": {
            "total": total,
            "count": count,
            "per_page": per_page,
            "current_page": page,
            "total_pages": total_pages
        }}
    })
}

fn named(kind: &str, rows: &[(String, String)]) -> Vec<Value> {
    rows.iter()
        .map(|(id, name)| json!({"type": kind, "id": id, "attributes": {"name": name}}))
        .collect()
}

async fn handle_about(State(state): State<SharedLedger>, headers: HeaderMap) -> Response {
    if let Some(failure) = record(&state, "GET", "/api/v1/about", &headers, None) {
        return failure;
    }
    Json(json!({"data": {"version": "6.1.0", "api_version": "2.1.0"}})).into_response()
}

async fn list_response(
    state: SharedLedger,
    path: &str,
    headers: HeaderMap,
    page: Option<usize>,
    rows: impl FnOnce(&LedgerState) -> Vec<Value>,
) -> Response {
    if let Some(failure) = record(&state, "GET", path, &headers, None) {
        return failure;
    }
    let Ok(guard) = state.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let page = if guard.ignore_page_param {
        1
    } else {
        page.unwrap_or(1)
    };
    Json(paged(rows(&guard), guard.page_size, page)).into_response()
}

async fn handle_categories(
    State(state): State<SharedLedger>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    list_response(state, "/api/v1/categories", headers, query.page, |s| {
        named("categories", &s.categories)
    })
    .await
}

async fn handle_budgets(
    State(state): State<SharedLedger>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    list_response(state, "/api/v1/budgets", headers, query.page, |s| {
        named("budgets", &s.budgets)
    })
    .await
}

async fn handle_bills(
    State(state): State<SharedLedger>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    list_response(state, "/api/v1/bills", headers, query.page, |s| {
        s.bills.clone()
    })
    .await
}

fn group_json(transaction: &Transaction) -> Value {
    let splits: Vec<Value> = transaction
        .journals
        .iter()
        .map(|journal| {
            json!({
                "transaction_journal_id": journal.transaction_journal_id,
                "description": transaction.description,
                "amount": format!("{:.2}", transaction.amount),
                "destination_name": transaction.destination_name,
                "tags": journal.tags,
            })
        })
        .collect();

    json!({"data": {
        "type": "transactions",
        "id": transaction.id,
        "attributes": {"group_title": null, "transactions": splits}
    }})
}

async fn handle_get_transaction(
    State(state): State<SharedLedger>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/api/v1/transactions/{}", id);
    if let Some(failure) = record(&state, "GET", &path, &headers, None) {
        return failure;
    }
    let Ok(guard) = state.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match guard.transactions.get(&id) {
        Some(transaction) => Json(group_json(transaction)).into_response(),
        None => (StatusCode::NOT_FOUND, r#"{"message":"Resource not found"}"#).into_response(),
    }
}

async fn handle_put_transaction(
    State(state): State<SharedLedger>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/api/v1/transactions/{}", id);
    if let Some(failure) = record(&state, "PUT", &path, &headers, Some(body.clone())) {
        return failure;
    }
    let Ok(mut guard) = state.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Some(transaction) = guard.transactions.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, r#"{"message":"Resource not found"}"#).into_response();
    };

    // Tags are replaced wholesale, as Firefly III does
    for entry in body["transactions"].as_array().into_iter().flatten() {
        let journal_id = entry["transaction_journal_id"].as_str();
        let tags: Option<Vec<String>> = entry["tags"].as_array().map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(String::from))
                .collect()
        });
        if let (Some(journal_id), Some(tags)) = (journal_id, tags) {
            if let Some(journal) = transaction
                .journals
                .iter_mut()
                .find(|j| j.transaction_journal_id == journal_id)
            {
                journal.tags = tags;
            }
        }
    }

    Json(group_json(transaction)).into_response()
}

/// Mock OpenAI-compatible chat completions server
///
/// Answers every `POST /chat/completions` with the configured status and body.
pub struct MockModelServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ModelState {
    status: StatusCode,
    reply: Value,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockModelServer {
    /// Serve a successful completion whose message content is `content`
    pub async fn with_content(content: &str) -> Self {
        Self::start(
            200,
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion",
                "model": "mock",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }]
            }),
        )
        .await
    }

    /// Serve a completion that calls `classify_transaction` with `arguments`
    pub async fn with_tool_call(arguments: &str) -> Self {
        Self::start(
            200,
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion",
                "model": "mock",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_mock",
                            "type": "function",
                            "function": {"name": "classify_transaction", "arguments": arguments}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }),
        )
        .await
    }

    /// Serve `reply` with `status` for every completion request
    pub async fn start(status: u16, reply: Value) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ModelState {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            reply,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/chat/completions", post(handle_chat_completion))
            .route("/models", get(handle_models))
            .with_state(state);

        let (addr, shutdown_tx) = serve(app).await;
        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_chat_completion(
    State(state): State<ModelState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(RecordedRequest {
            method: "POST".into(),
            path: "/chat/completions".into(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: Some(body),
        });
    }
    (state.status, Json(state.reply.clone())).into_response()
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "mock", "object": "model"}]}))
}

/// Bind to an ephemeral port and serve until the returned sender fires
async fn serve(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}
