// Transaction Classifier - Web Server
// REST API with Axum over the classification engine

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use transaction_classifier::config::{DEFAULT_ANALYSIS_DAYS, DEFAULT_BATCH_LIMIT};
use transaction_classifier::{
    init_tracing, open_database, ClassificationEngine, ClassifierConfig, OriginWeights,
    SqliteTransactionStore, TransactionKind, VERSION,
};

const DEFAULT_TOP_N: usize = 3;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: Arc<ClassificationEngine>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn internal_error(context: &str, error: anyhow::Error) -> Response {
    tracing::error!(error = %format!("{:#}", error), "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::err(format!("{}: {}", context, error))),
    )
        .into_response()
}

/// Classification request body
#[derive(Deserialize)]
struct ClassifyRequest {
    description: String,
    amount: Decimal,
    kind: TransactionKind,
    /// Defaults to now
    #[serde(default)]
    timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    weights: Option<OriginWeights>,
    #[serde(default)]
    top_n: Option<usize>,
}

impl ClassifyRequest {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp.unwrap_or_else(|| Local::now().naive_local())
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({ "status": "OK", "version": VERSION })))
}

/// POST /api/classify/category
async fn classify_category(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> Response {
    ok(state.engine.classify_category(&req.description, req.amount, req.kind))
}

/// POST /api/classify/origin
async fn classify_origin(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> Response {
    ok(state.engine.classify_origin(
        &req.description,
        req.amount,
        req.timestamp(),
        req.kind,
        req.weights.as_ref(),
    ))
}

/// POST /api/suggest/categories
async fn suggest_categories(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> Response {
    let top_n = req.top_n.unwrap_or(DEFAULT_TOP_N);
    ok(state.engine.suggest_categories(&req.description, req.amount, req.kind, top_n))
}

/// POST /api/suggest/origin
async fn suggest_origin(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> Response {
    ok(state.engine.suggest_origin(&req.description, req.amount, req.timestamp(), req.kind))
}

/// POST /api/companies/:id/reclassify/categories?limit=
async fn reclassify_categories(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_BATCH_LIMIT);
    let result = with_store(&state, |store| {
        state.engine.reclassify_categories(store, company_id, limit)
    });

    match result {
        Ok(stats) => ok(stats),
        Err(e) => internal_error("Category reclassification failed", e),
    }
}

/// POST /api/companies/:id/reclassify/origins?limit=
async fn reclassify_origins(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_BATCH_LIMIT);
    let result = with_store(&state, |store| {
        state.engine.reclassify_origins(store, company_id, limit)
    });

    match result {
        Ok(stats) => ok(stats),
        Err(e) => internal_error("Origin reclassification failed", e),
    }
}

/// GET /api/companies/:id/patterns?days=
async fn get_patterns(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<DaysQuery>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_ANALYSIS_DAYS);
    let result = with_store(&state, |store| {
        state.engine.analyze_patterns(store, company_id, days)
    });

    match result {
        Ok(report) => ok(report),
        Err(e) => internal_error("Pattern analysis failed", e),
    }
}

/// Run `f` against the shared connection
fn with_store<T>(state: &AppState, f: impl FnOnce(&SqliteTransactionStore) -> Result<T>) -> Result<T> {
    let conn = state
        .db
        .lock()
        .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
    let store = SqliteTransactionStore::new(&conn);
    f(&store)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let db_path = std::env::var("CLASSIFIER_DB").unwrap_or_else(|_| "transactions.db".to_string());
    let conn = open_database(&db_path)?;
    tracing::info!(path = %db_path, "database opened");

    let config_path = std::env::var("CLASSIFIER_CONFIG").ok().map(std::path::PathBuf::from);
    let config = ClassifierConfig::load(config_path.as_deref())?;

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: Arc::new(ClassificationEngine::new(config)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/classify/category", post(classify_category))
        .route("/classify/origin", post(classify_origin))
        .route("/suggest/categories", post(suggest_categories))
        .route("/suggest/origin", post(suggest_origin))
        .route("/companies/:id/reclassify/categories", post(reclassify_categories))
        .route("/companies/:id/reclassify/origins", post(reclassify_origins))
        .route("/companies/:id/patterns", get(get_patterns))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("CLASSIFIER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "classifier server running");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
