use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use ircore::persist::{load_snapshot, IndexPaths, Snapshot};
use ircore::tokenizer::query_terms;
use ircore::{EngineConfig, PostingList, Query, QueryEngine, QueryType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub mode: QueryType,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize, Deserialize, Clone)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    /// Query text, used when `terms` is absent
    #[serde(default)]
    pub q: Option<String>,
    /// Weighted terms of a previously expanded query
    #[serde(default)]
    pub terms: Option<Vec<WeightedTerm>>,
    /// Relevance of each ranked result, in result order
    pub relevant: Vec<bool>,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: QueryType,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub terms: Vec<WeightedTerm>,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f64,
    pub title: String,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    /// Swapped whole on reload; readers clone the `Arc` and never hold the lock while searching.
    pub snapshot: Arc<RwLock<Arc<Snapshot>>>,
    pub engine_config: EngineConfig,
    pub admin_token: Option<String>,
}

impl AppState {
    fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }
}

/// `admin_token` guards the admin endpoints; with `None` they always answer 401.
pub fn build_app(index_dir: String, engine_config: EngineConfig, admin_token: Option<String>) -> Result<Router> {
    // Load the snapshot at startup
    let snapshot = load_snapshot(&IndexPaths::new(&index_dir))?;
    let app_state = AppState {
        index_paths_root: PathBuf::from(&index_dir),
        snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        engine_config,
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/feedback", post(feedback_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, axum::extract::Query(params): axum::extract::Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let snapshot = state.current();
    let engine = QueryEngine::new(&snapshot.index, state.engine_config.clone());

    let query = Query::from_terms(query_terms(&params.q));
    let hits = engine.search(&query, params.mode);

    let response = respond(&state, &snapshot, params.q, params.mode, &query, &hits, params.k, start);
    Json(response)
}

pub async fn feedback_handler(State(state): State<AppState>, Json(req): Json<FeedbackRequest>) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let snapshot = state.current();
    let engine = QueryEngine::new(&snapshot.index, state.engine_config.clone());

    let (text, mut query) = match (req.terms, req.q) {
        (Some(terms), _) => {
            let text = terms.iter().map(|t| t.term.as_str()).collect::<Vec<_>>().join(" ");
            (text, Query::from_weighted(terms.into_iter().map(|t| (t.term, t.weight))))
        }
        (None, Some(q)) => {
            let query = Query::from_terms(query_terms(&q));
            (q, query)
        }
        (None, None) => return Err((StatusCode::BAD_REQUEST, "either `q` or `terms` is required".into())),
    };

    // Judgments refer to the ranking the client saw for this exact query
    let previous = engine.ranked(&query);
    query.relevance_feedback(&previous, &req.relevant, &snapshot.index, engine.config());
    let hits = engine.ranked(&query);

    let response = respond(&state, &snapshot, text, QueryType::Ranked, &query, &hits, req.k, start);
    Ok(Json(response))
}

#[allow(clippy::too_many_arguments)]
fn respond(state: &AppState, snapshot: &Snapshot, text: String, mode: QueryType, query: &Query, hits: &PostingList, k: usize, start: std::time::Instant) -> SearchResponse {
    let k = k.max(1).min(100);
    let raw_terms: Vec<String> = text.split_whitespace().map(|s| s.to_string()).collect();
    let mut results: Vec<SearchHit> = Vec::new();
    for posting in hits.iter().take(k) {
        if let Some(meta) = snapshot.docs.get(&posting.doc_id) {
            let snippet = meta
                .text_path
                .as_ref()
                .and_then(|rel| snippet_from_file(&state.index_paths_root.join(rel), &raw_terms));
            results.push(SearchHit { doc_id: posting.doc_id, score: posting.score, title: meta.title.clone(), url: meta.url.clone(), snippet });
        }
    }
    let terms = query
        .weighted_terms()
        .map(|(term, weight)| WeightedTerm { term: term.to_string(), weight })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %text, ?mode, total_hits = hits.len(), "search served");
    SearchResponse { query: text, mode, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits: hits.len(), terms, results }
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.current();
    let meta = snapshot.docs.get(&doc_id).ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    let mut obj = serde_json::json!({
        "doc_id": doc_id,
        "title": meta.title,
        "url": meta.url,
        "length": snapshot.index.doc_length(doc_id),
    });
    if let Some(rel) = &meta.text_path {
        if let Ok(text) = std::fs::read_to_string(state.index_paths_root.join(rel)) {
            obj["text"] = serde_json::Value::String(text);
        }
    }
    Ok(Json(obj))
}

fn snippet_from_file(path: &PathBuf, raw_terms: &[String]) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let mut first_idx: Option<usize> = None;
    for term in raw_terms {
        if term.trim().is_empty() { continue; }
        if let Some(pos) = find_case_insensitive(&text, term) { first_idx = Some(pos); break; }
    }
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(&text, idx.saturating_sub(100));
            let end = floor_char_boundary(&text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.to_lowercase();
    let n = needle.to_lowercase();
    h.find(&n)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

async fn reload_handler(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_paths_root);
    let fresh = tokio::task::spawn_blocking(move || load_snapshot(&paths))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    let (num_docs, num_terms) = (fresh.index.num_docs(), fresh.index.num_terms());
    *state.snapshot.write() = Arc::new(fresh);
    tracing::info!(num_docs, num_terms, "snapshot swapped");
    Ok(Json(serde_json::json!({ "num_docs": num_docs, "num_terms": num_terms })))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_case_insensitively() {
        let out = highlight_terms("Rust and rust", &["RUST".to_string()]);
        assert_eq!(out, "<em>Rust</em> and <em>rust</em>");
    }

    #[test]
    fn char_boundary_never_splits_utf8() {
        let s = "héllo";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 99), s.len());
    }
}
