// FinHealth - REST API with Axum
// Statement upload plus read-only assessment history

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use crate::analysis::{record_analysis, AnalysisReport, StatementAnalyzer};
use crate::db::{get_all_assessments, get_assessments_by_industry, get_industry_stats, Assessment, IndustryStat};
use crate::error::{AnalysisError, ErrorResponse};
use crate::metrics::DEFAULT_INDUSTRY;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub analyzer: Arc<StatementAnalyzer>,
}

impl AppState {
    pub fn new(conn: Connection, analyzer: StatementAnalyzer) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            analyzer: Arc::new(analyzer),
        }
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, AnalysisError> {
        self.db
            .lock()
            .map_err(|_| AnalysisError::Persistence(anyhow::anyhow!("database lock poisoned")))
    }
}

/// API Response wrapper for the read-only endpoints
#[derive(Serialize)]
pub struct ApiResponse<T> {
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

#[derive(Debug, Default, Deserialize)]
pub struct IndustryParams {
    pub industry: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        AnalysisError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn analysis_error_response(err: &AnalysisError) -> Response {
    log::warn!("⚠️  Upload rejected ({}): {}", err.kind(), err);
    (status_for(err), Json(ErrorResponse::from(err))).into_response()
}

fn bad_request(message: String) -> Response {
    log::warn!("⚠️  Bad upload request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("bad_request", message)),
    )
        .into_response()
}

fn internal_error(message: String) -> Response {
    log::error!("❌ {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal_error", message)),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /upload - Analyze a statement upload (multipart "file", optional "industry")
async fn upload_statement(
    State(state): State<AppState>,
    Query(params): Query<IndustryParams>,
    mut multipart: Multipart,
) -> Response {
    let mut industry = params.industry;
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {}", e)),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => return bad_request(format!("Failed to read uploaded file: {}", e)),
                }
            }
            "industry" => match field.text().await {
                Ok(text) => industry = Some(text),
                Err(e) => return bad_request(format!("Failed to read industry field: {}", e)),
            },
            _ => {}
        }
    }

    let (filename, content) = match upload {
        Some(upload) => upload,
        None => return bad_request("Missing multipart field 'file'".to_string()),
    };
    let industry = industry.unwrap_or_else(|| DEFAULT_INDUSTRY.to_string());

    // Parse and compute off the async workers, before taking the database lock
    let analyzer = Arc::clone(&state.analyzer);
    let task = tokio::task::spawn_blocking(move || analyzer.analyze(&content, &filename, &industry));
    let analysis = match task.await {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(e)) => return analysis_error_response(&e),
        Err(e) => return internal_error(format!("Analysis task failed: {}", e)),
    };

    let recorded = state
        .lock_db()
        .and_then(|conn| record_analysis(&conn, &analysis));

    match recorded {
        Ok(assessment) => {
            let report = AnalysisReport::new(&analysis.metrics, Some(assessment.assessment_id));
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => analysis_error_response(&e),
    }
}

/// GET /api/assessments - Stored assessments, optionally for one industry
async fn list_assessments(
    State(state): State<AppState>,
    Query(params): Query<IndustryParams>,
) -> Response {
    let result = state.lock_db().map_err(anyhow::Error::from).and_then(|conn| {
        match params.industry.as_deref() {
            Some(industry) => get_assessments_by_industry(&conn, industry),
            None => get_all_assessments(&conn),
        }
    });

    match result {
        Ok(assessments) => (StatusCode::OK, Json(ApiResponse::ok(assessments))).into_response(),
        Err(e) => {
            log::error!("❌ Error getting assessments: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<Assessment>>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/stats - Per-industry statistics
async fn get_stats(State(state): State<AppState>) -> Response {
    let result = state
        .lock_db()
        .map_err(anyhow::Error::from)
        .and_then(|conn| get_industry_stats(&conn));

    match result {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => {
            log::error!("❌ Error getting stats: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<IndustryStat>>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/assessments", get(list_assessments))
        .route("/stats", get(get_stats))
        .with_state(state.clone());

    Router::new()
        .route("/upload", post(upload_statement))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
}
