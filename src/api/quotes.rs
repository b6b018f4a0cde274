use crate::api::AppState;
use crate::db::{QuoteId, QuoteSummary, RevisionId, RevisionSummary};
use crate::engine::ValidationReport;
use crate::error::AppError;
use crate::orchestration::{Preview, QuoteView, RevisionCreated};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub revision_id: Option<RevisionId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevisionRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub computable: bool,
    #[serde(flatten)]
    pub report: ValidationReport,
}

fn quote_id(id: i64) -> Result<QuoteId, AppError> {
    if id <= 0 {
        return Err(AppError::BadRequest(format!("invalid quote id {id}")));
    }
    Ok(id)
}

pub async fn preview(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Preview>, AppError> {
    Ok(Json(state.orchestrator.preview(body)?))
}

pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ValidateResponse>, AppError> {
    let report = state.orchestrator.validate(body)?;
    Ok(Json(ValidateResponse {
        computable: report.is_computable(),
        report,
    }))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<QuoteSummary>>, AppError> {
    Ok(Json(state.orchestrator.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<QuoteView>), AppError> {
    let view = state.orchestrator.create(body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    Path(id): Path<i64>,
    Query(params): Query<QuoteQuery>,
    State(state): State<AppState>,
) -> Result<Json<QuoteView>, AppError> {
    let id = quote_id(id)?;
    Ok(Json(state.orchestrator.get(id, params.revision_id).await?))
}

pub async fn update(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<QuoteView>, AppError> {
    let id = quote_id(id)?;
    Ok(Json(state.orchestrator.update(id, body).await?))
}

pub async fn recalculate(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<QuoteView>, AppError> {
    let id = quote_id(id)?;
    Ok(Json(state.orchestrator.recalculate(id).await?))
}

pub async fn duplicate(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<QuoteView>), AppError> {
    let id = quote_id(id)?;
    let view = state.orchestrator.duplicate(id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_revisions(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RevisionSummary>>, AppError> {
    let id = quote_id(id)?;
    Ok(Json(state.orchestrator.list_revisions(id).await?))
}

pub async fn create_revision(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    body: Option<Json<RevisionRequest>>,
) -> Result<(StatusCode, Json<RevisionCreated>), AppError> {
    let id = quote_id(id)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let created = state
        .orchestrator
        .create_revision(id, request.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
