//! HTTP server exposing the analysis pipeline and stored reports.
//!
//! # Routes
//!
//! ```text
//! GET  /health        liveness and version
//! POST /analyze       {samples, age, gender} ──→ EcgAnalysis
//! GET  /reports       reports of the signed-in user, newest first
//! GET  /reports/:id   one report with joined patient data
//! ```

use crate::audit::{create_shared_log, SharedAuditLog};
use crate::collector::{Gender, PatientContext, Sample};
use crate::core::report::{analyze, EcgAnalysis};
use crate::store::{EcgReport, EcgStore, MemoryStore, ReportRepository, StoreError};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Store backing the report routes
    pub store: Arc<dyn EcgStore>,
    /// Audit log updated by the analysis route
    pub audit: SharedAuditLog,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, store: Arc<dyn EcgStore>) -> Self {
        Self {
            port,
            store,
            audit: create_shared_log(),
        }
    }

    /// Configuration backed by an in-memory store signed in as `user_id`.
    pub fn in_memory(port: u16, user_id: impl Into<String>) -> Self {
        Self::new(port, Arc::new(MemoryStore::with_user(user_id)))
    }

    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = audit;
        self
    }
}

/// Shared server state
struct ServerState {
    store: Arc<dyn EcgStore>,
    audit: SharedAuditLog,
}

/// Body of `POST /analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub samples: Vec<Sample>,
    pub age: u32,
    pub gender: Gender,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotAuthenticated => {
            error(StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED", e.to_string())
        }
        StoreError::NotFound(_) => error(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        StoreError::Invalid(_) => error(StatusCode::BAD_REQUEST, "INVALID", e.to_string()),
        _ => {
            tracing::error!("Store failure: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", e.to_string())
        }
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /analyze
///
/// Runs the pipeline over the posted samples. Nothing is stored.
async fn analyze_samples(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<EcgAnalysis>, ApiError> {
    let Json(request) = body.map_err(|e| {
        error(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            format!("Invalid analysis request: {}", e.body_text()),
        )
    })?;

    let without_hr = request
        .samples
        .iter()
        .filter(|s| s.reading().is_none())
        .count();
    state
        .audit
        .record_samples(request.samples.len() as u64, without_hr as u64);

    let analysis = analyze(
        &request.samples,
        PatientContext::new(request.age, request.gender),
    );
    state.audit.record_recording_completed();
    tracing::debug!(
        "Analysed {} samples: {} bpm",
        request.samples.len(),
        analysis.heart_rate
    );

    Ok(Json(analysis))
}

/// GET /reports
async fn list_reports(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<EcgReport>>, ApiError> {
    state.store.list_reports().map(Json).map_err(store_error)
}

/// GET /reports/:id
async fn get_report(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<EcgReport>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| {
        error(
            StatusCode::BAD_REQUEST,
            "INVALID_ID",
            format!("Invalid report id: {id}"),
        )
    })?;
    state.store.get_report(id).map(Json).map_err(store_error)
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_samples))
        .route("/reports", get(list_reports))
        .route("/reports/:id", get(get_report))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState {
        store: config.store,
        audit: config.audit,
    });
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("ECG report server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
