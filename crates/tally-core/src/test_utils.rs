//! Test utilities for tally-core
//!
//! Mock HTTP servers standing in for the external services:
//! - `MockTranslateServer`: the `translate_a/single` translation endpoint
//! - `MockRestServer`: the subset of a PostgREST backend the REST gateway uses
//!
//! Both bind an ephemeral port on 127.0.0.1 and shut down when dropped.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::oneshot;

/// Start `app` on an ephemeral port; returns the address and a shutdown handle
async fn serve(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

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

// ========== Translation endpoint ==========

#[derive(Default)]
struct TranslateState {
    /// Texts that always fail, with the status to return
    failing: HashMap<String, u16>,
    /// Texts that translate to an empty string
    empty: HashSet<String>,
    /// Requests left to answer with 429 before behaving normally
    throttle_remaining: AtomicUsize,
    requests: AtomicUsize,
}

/// Configures a `MockTranslateServer` before it starts
#[derive(Default)]
pub struct MockTranslateServerBuilder {
    state: TranslateState,
}

impl MockTranslateServerBuilder {
    /// Answer every request for `text` with `status`
    pub fn fail_text(mut self, text: &str, status: u16) -> Self {
        self.state.failing.insert(text.to_string(), status);
        self
    }

    /// Return an empty translation for `text`
    pub fn empty_text(mut self, text: &str) -> Self {
        self.state.empty.insert(text.to_string());
        self
    }

    /// Answer the first `n` requests with 429 Too Many Requests
    pub fn throttle_first(self, n: usize) -> Self {
        self.state.throttle_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub async fn start(self) -> MockTranslateServer {
        let state = Arc::new(self.state);
        let app = Router::new()
            .route("/translate_a/single", get(handle_translate))
            .with_state(state.clone());

        let (addr, shutdown_tx) = serve(app).await;
        MockTranslateServer {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }
}

/// Mock translation server
///
/// Translates `text` to `"[<tl>] <text>"`.
pub struct MockTranslateServer {
    addr: SocketAddr,
    state: Arc<TranslateState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockTranslateServer {
    /// Start with default behaviour (every text translates)
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> MockTranslateServerBuilder {
        MockTranslateServerBuilder::default()
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockTranslateServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_translate(
    State(state): State<Arc<TranslateState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let throttled = state
        .throttle_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if throttled {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let text = params.get("q").cloned().unwrap_or_default();
    let source = params.get("sl").cloned().unwrap_or_default();
    let target = params.get("tl").cloned().unwrap_or_default();

    if let Some(status) = state.failing.get(&text) {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "mock failure").into_response();
    }

    let translated = if state.empty.contains(&text) {
        String::new()
    } else {
        format!("[{}] {}", target, text)
    };

    Json(json!([[[translated, text, null, null, 1]], null, source])).into_response()
}

// ========== REST backend ==========

/// API key accepted by `MockRestServer`
pub const MOCK_REST_API_KEY: &str = "anon-key";

#[derive(Default)]
struct RestState {
    tables: HashMap<String, Vec<Value>>,
    next_id: i64,
}

/// Mock PostgREST-style backend
///
/// Supports `GET`, `POST`, `PATCH` and `DELETE` on `/rest/v1/<table>` with
/// `column=eq.value` filters and `order=column.desc`. Requests must carry the
/// `apikey` header `MOCK_REST_API_KEY`.
pub struct MockRestServer {
    addr: SocketAddr,
    state: Arc<Mutex<RestState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockRestServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(RestState::default()));
        let app = Router::new()
            .route("/rest/v1/:table", any(handle_table))
            .with_state(state.clone());

        let (addr, shutdown_tx) = serve(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of rows currently in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map_or(0, Vec::len)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockRestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Whether a row passes every `column=eq.value` filter
fn row_matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expected)| {
        row.get(column)
            .map_or(false, |value| cell_text(value) == *expected)
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn handle_table(
    State(state): State<Arc<Mutex<RestState>>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let api_key = headers.get("apikey").and_then(|v| v.to_str().ok());
    if api_key != Some(MOCK_REST_API_KEY) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    let mut order = None;
    let mut filters = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "select" => {}
            "order" => order = Some(value),
            _ => {
                if let Some(expected) = value.strip_prefix("eq.") {
                    filters.push((key, expected.to_string()));
                }
            }
        }
    }

    let mut guard = state.lock().unwrap();
    let state = &mut *guard;

    match method {
        Method::GET => {
            let mut rows: Vec<Value> = state
                .tables
                .get(&table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row_matches(row, &filters))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if let Some(order) = order {
                let (column, direction) = order.split_once('.').unwrap_or((order.as_str(), "asc"));
                rows.sort_by_key(|row| row.get(column).map(cell_text).unwrap_or_default());
                if direction == "desc" {
                    rows.reverse();
                }
            }
            Json(rows).into_response()
        }
        Method::POST => {
            let incoming: Vec<Map<String, Value>> = match serde_json::from_slice(&body) {
                Ok(rows) => rows,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            };
            let mut created = Vec::new();
            for mut row in incoming {
                state.next_id += 1;
                row.insert("id".into(), json!(state.next_id));
                if table == "transactions" {
                    row.entry("created_at").or_insert_with(|| {
                        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
                    });
                    row.entry("category_id").or_insert(Value::Null);
                    row.entry("priority").or_insert(Value::Null);
                }
                created.push(Value::Object(row));
            }
            state
                .tables
                .entry(table)
                .or_default()
                .extend(created.iter().cloned());
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Method::PATCH => {
            let patch: Map<String, Value> = match serde_json::from_slice(&body) {
                Ok(patch) => patch,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            };
            let mut updated = Vec::new();
            if let Some(rows) = state.tables.get_mut(&table) {
                for row in rows.iter_mut().filter(|row| row_matches(row, &filters)) {
                    if let Value::Object(fields) = row {
                        for (key, value) in &patch {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    updated.push(row.clone());
                }
            }
            Json(updated).into_response()
        }
        Method::DELETE => {
            let mut removed = Vec::new();
            if let Some(rows) = state.tables.get_mut(&table) {
                rows.retain(|row| {
                    if row_matches(row, &filters) {
                        removed.push(row.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            Json(removed).into_response()
        }
        _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "Unsupported method"),
    }
}
