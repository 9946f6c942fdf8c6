use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use nd_core::{NewsletterRecord, StoreStats, TriggerKind};
use nd_pipeline::{GateHolder, PipelineRun, RunStatus};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Newsletter {0} not found")]
    NotFound(String),
    #[error("Run aborted: {0}")]
    RunAborted(String),
    #[error(transparent)]
    Core(#[from] nd_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RunAborted(e) => {
                error!("Manual run aborted: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Core(e) => {
                error!("Request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Manual trigger. The run gets its own task so a dropped request cannot
/// cancel it halfway; the response waits for it to finish.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<PipelineRun>), ApiError> {
    info!("Manual run requested");
    let orchestrator = Arc::clone(&state.orchestrator);
    let run = tokio::spawn(async move { orchestrator.run(TriggerKind::Manual).await })
        .await
        .map_err(|e| ApiError::RunAborted(e.to_string()))?;
    let status = match run.status() {
        Some(RunStatus::SkippedLocked) => StatusCode::CONFLICT,
        Some(RunStatus::Failed) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    Ok((status, Json(run)))
}

#[derive(Debug, Serialize)]
pub struct GateStatus {
    pub held: bool,
    pub holder: Option<GateHolder>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleStatus {
    pub schedule: String,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub gate: GateStatus,
    pub scheduler: Option<ScheduleStatus>,
    pub store: StoreStats,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let holder = state.gate().holder();
    Ok(Json(StatusResponse {
        gate: GateStatus {
            held: holder.is_some(),
            holder,
        },
        scheduler: state.scheduler.as_ref().map(|s| ScheduleStatus {
            schedule: s.spec().to_string(),
            next_run: s.next_run(),
        }),
        store: state.store().stats().await?,
    }))
}

/// Archive listing without the rendered bodies.
#[derive(Debug, Serialize)]
pub struct NewsletterSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub story_count: usize,
    pub generation_method: TriggerKind,
    pub email_sent: bool,
    pub error_reason: Option<String>,
}

impl From<NewsletterRecord> for NewsletterSummary {
    fn from(record: NewsletterRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            created_at: record.created_at,
            story_count: record.story_count,
            generation_method: record.generation_method,
            email_sent: record.email_sent,
            error_reason: record.error_reason,
        }
    }
}

pub async fn list_newsletters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NewsletterSummary>>, ApiError> {
    let records = state.store().list_newsletters().await?;
    Ok(Json(records.into_iter().map(NewsletterSummary::from).collect()))
}

pub async fn get_newsletter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NewsletterRecord>, ApiError> {
    state
        .store()
        .get_newsletter(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

pub async fn get_newsletter_html(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    state
        .store()
        .get_newsletter(&id)
        .await?
        .map(|record| Html(record.html_content))
        .ok_or(ApiError::NotFound(id))
}

pub async fn delete_newsletter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store().delete_newsletter(&id).await? {
        info!("Deleted newsletter {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}
