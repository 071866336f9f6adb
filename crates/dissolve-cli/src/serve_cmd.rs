use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use dissolve_core::roadmap::{RoadmapSummary, roadmap_summary};
use dissolve_core::{
    CompileError, CompileOutcome, PgStore, PlanStep, RoadmapAggregator, ScheduleCompilerService,
    StepTemplateCatalog,
};
use dissolve_db::models::{Company, TaskCategory};
use dissolve_db::queries::{companies as company_db, tasks as task_db};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<CompileError> for AppError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::NotFound(_) => Self::not_found(err.to_string()),
            other => Self::internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and response types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<StepTemplateCatalog>,
}

#[derive(Debug, Serialize)]
pub struct RoadmapResponse {
    pub company_id: Uuid,
    pub summary: Option<RoadmapSummary>,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileResponse {
    Compiled { tasks: u64, plan_end: NaiveDate },
    AlreadyCompiled,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/catalog", get(get_catalog))
        .route("/api/companies", get(list_companies))
        .route("/api/companies/{id}/roadmap", get(get_roadmap))
        .route("/api/companies/{id}/tasks", get(list_tasks))
        .route("/api/companies/{id}/compile", post(compile_company))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("dissolve serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("dissolve serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn require_company(pool: &PgPool, id: Uuid) -> Result<Company, AppError> {
    company_db::get_company(pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("company {id} not found")))
}

async fn get_catalog(State(state): State<AppState>) -> Json<StepTemplateCatalog> {
    Json(StepTemplateCatalog::clone(&state.catalog))
}

async fn list_companies(
    State(state): State<AppState>,
) -> Result<axum::response::Response, AppError> {
    let all = company_db::list_companies(&state.pool)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(all).into_response())
}

async fn get_roadmap(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    require_company(&state.pool, id).await?;

    let store = PgStore::new(state.pool.clone());
    let steps = RoadmapAggregator::new(&state.catalog, &store)
        .roadmap(id)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(RoadmapResponse {
        company_id: id,
        summary: roadmap_summary(&steps),
        steps,
    })
    .into_response())
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    require_company(&state.pool, id).await?;

    let tasks = task_db::list_tasks_for_company(&state.pool, id, TaskCategory::Dissolution)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(tasks).into_response())
}

async fn compile_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    let store = PgStore::new(state.pool.clone());
    let outcome = ScheduleCompilerService::new(&state.catalog, &store, &store, &store)
        .compile(id)
        .await?;

    Ok(match outcome {
        CompileOutcome::Compiled { tasks, plan_end } => (
            StatusCode::CREATED,
            Json(CompileResponse::Compiled { tasks, plan_end }),
        )
            .into_response(),
        CompileOutcome::AlreadyCompiled => {
            (StatusCode::OK, Json(CompileResponse::AlreadyCompiled)).into_response()
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
